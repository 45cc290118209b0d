use std::fmt;
use std::str::FromStr;

use crate::error::{FrameError, Result};

/// Encoded header length without sub-packet fields.
pub const HEADER_LEN: usize = 12;

/// Encoded header length with sub-packet total and index.
pub const SPLIT_HEADER_LEN: usize = 16;

/// Largest body a single frame can carry (10-bit length field).
pub const MAX_BODY_LENGTH: usize = 1023;

/// Decimal digits in a terminal identifier.
pub const TERMINAL_ID_DIGITS: usize = 12;

const TERMINAL_ID_BYTES: usize = TERMINAL_ID_DIGITS / 2;

// Properties word layout.
const BODY_LENGTH_MASK: u16 = 0x03FF;
const ENCRYPTED_BIT: u16 = 1 << 10;
const SPLIT_BIT: u16 = 1 << 13;

/// Terminal identifier: 12 decimal digits packed as 6 BCD bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TerminalId([u8; TERMINAL_ID_BYTES]);

impl TerminalId {
    /// Wrap raw BCD bytes as received on the wire.
    pub const fn from_bcd(bytes: [u8; TERMINAL_ID_BYTES]) -> Self {
        Self(bytes)
    }

    /// The packed BCD form, always full width.
    pub fn as_bcd(&self) -> &[u8; TERMINAL_ID_BYTES] {
        &self.0
    }

    fn nibbles(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().flat_map(|b| [b >> 4, b & 0x0F])
    }
}

impl FromStr for TerminalId {
    type Err = FrameError;

    /// Parse up to 12 decimal digits, right-aligned and zero padded.
    ///
    /// Only the first 12 characters of a longer string are used.
    fn from_str(s: &str) -> Result<Self> {
        let mut digits = [0u8; TERMINAL_ID_DIGITS];
        let given: Vec<char> = s.chars().take(TERMINAL_ID_DIGITS).collect();
        let offset = TERMINAL_ID_DIGITS - given.len();

        for (slot, c) in digits[offset..].iter_mut().zip(given) {
            *slot = c.to_digit(10).ok_or(FrameError::InvalidDigit(c))? as u8;
        }

        let mut bcd = [0u8; TERMINAL_ID_BYTES];
        for (byte, pair) in bcd.iter_mut().zip(digits.chunks_exact(2)) {
            *byte = pair[0] << 4 | pair[1];
        }
        Ok(Self(bcd))
    }
}

impl fmt::Display for TerminalId {
    /// Renders the digits with leading zeros stripped (`"0"` when all zero).
    ///
    /// Nibbles above 9 are not valid BCD; they render as hex letters so a
    /// corrupt identifier stays visible instead of being hidden.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut significant = self.nibbles().skip_while(|&n| n == 0).peekable();
        if significant.peek().is_none() {
            return f.write_str("0");
        }
        for n in significant {
            let c = char::from_digit(u32::from(n), 16).unwrap_or('?');
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

/// Message header, 12 bytes on the wire or 16 with the split flag set.
///
/// ```text
/// bytes 0-1   message id
/// bytes 2-3   properties: bits 0-9 body length, bit 10 encrypted, bit 13 split
/// bytes 4-9   terminal id (BCD)
/// bytes 10-11 serial number
/// bytes 12-13 sub-packet total   (split only)
/// bytes 14-15 sub-packet index   (split only)
/// ```
///
/// All integers are big-endian. Reserved property bits are kept as received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Header {
    /// Application-defined message type.
    pub message_id: u16,
    /// Sender serial number; wraps at 2^16.
    pub serial_number: u16,
    /// Terminal the message belongs to.
    pub terminal_id: TerminalId,
    properties: u16,
    total: u16,
    index: u16,
}

impl Header {
    /// Create an unsplit, unencrypted header with an empty body.
    pub fn new(message_id: u16, terminal_id: TerminalId) -> Self {
        Self {
            message_id,
            terminal_id,
            ..Self::default()
        }
    }

    pub fn with_serial_number(mut self, serial_number: u16) -> Self {
        self.serial_number = serial_number;
        self
    }

    pub fn with_encrypted(mut self, encrypted: bool) -> Self {
        self.set_encrypted(encrypted);
        self
    }

    pub fn with_sub_packet(mut self, total: u16, index: u16) -> Self {
        self.set_sub_packet(total, index);
        self
    }

    /// Body length of this frame (0..=1023).
    pub fn body_length(&self) -> usize {
        usize::from(self.properties & BODY_LENGTH_MASK)
    }

    /// Set the body length; fails when it does not fit the 10-bit field.
    pub fn set_body_length(&mut self, length: usize) -> Result<()> {
        if length > MAX_BODY_LENGTH {
            return Err(FrameError::PayloadTooLarge {
                size: length,
                max: MAX_BODY_LENGTH,
            });
        }
        self.properties = (self.properties & !BODY_LENGTH_MASK) | length as u16;
        Ok(())
    }

    pub fn is_encrypted(&self) -> bool {
        self.properties & ENCRYPTED_BIT != 0
    }

    pub fn set_encrypted(&mut self, encrypted: bool) {
        if encrypted {
            self.properties |= ENCRYPTED_BIT;
        } else {
            self.properties &= !ENCRYPTED_BIT;
        }
    }

    pub fn is_split(&self) -> bool {
        self.properties & SPLIT_BIT != 0
    }

    /// Mark this header as sub-packet `index` of `total`.
    ///
    /// Values are stored as given; [`Header::verify`] checks them.
    pub fn set_sub_packet(&mut self, total: u16, index: u16) {
        self.properties |= SPLIT_BIT;
        self.total = total;
        self.index = index;
    }

    /// Clear the split flag and the sub-packet fields.
    pub fn clear_sub_packet(&mut self) {
        self.properties &= !SPLIT_BIT;
        self.total = 0;
        self.index = 0;
    }

    /// Number of sub-packets, or `None` for an unsplit frame.
    pub fn total(&self) -> Option<u16> {
        self.is_split().then_some(self.total)
    }

    /// 1-based sub-packet position, or `None` for an unsplit frame.
    pub fn index(&self) -> Option<u16> {
        self.is_split().then_some(self.index)
    }

    /// Encoded size: 12 bytes, or 16 with the split flag set.
    pub fn encoded_len(&self) -> usize {
        if self.is_split() {
            SPLIT_HEADER_LEN
        } else {
            HEADER_LEN
        }
    }

    /// Write the packed header into `dst`, returning the bytes written.
    pub fn encode(&self, dst: &mut [u8]) -> Result<usize> {
        let len = self.encoded_len();
        if dst.len() < len {
            return Err(FrameError::InsufficientSpace {
                required: len,
                available: dst.len(),
            });
        }

        dst[0..2].copy_from_slice(&self.message_id.to_be_bytes());
        dst[2..4].copy_from_slice(&self.properties.to_be_bytes());
        dst[4..10].copy_from_slice(&self.terminal_id.0);
        dst[10..12].copy_from_slice(&self.serial_number.to_be_bytes());
        if self.is_split() {
            dst[12..14].copy_from_slice(&self.total.to_be_bytes());
            dst[14..16].copy_from_slice(&self.index.to_be_bytes());
        }
        Ok(len)
    }

    /// Read a packed header from the front of `src`.
    ///
    /// Returns the header and the number of bytes consumed. The properties
    /// word decides whether the four sub-packet bytes must be present.
    pub fn decode(src: &[u8]) -> Result<(Self, usize)> {
        if src.len() < HEADER_LEN {
            return Err(FrameError::InsufficientSpace {
                required: HEADER_LEN,
                available: src.len(),
            });
        }

        let mut header = Self {
            message_id: be_u16(&src[0..2]),
            properties: be_u16(&src[2..4]),
            serial_number: be_u16(&src[10..12]),
            ..Self::default()
        };
        header.terminal_id.0.copy_from_slice(&src[4..10]);

        if !header.is_split() {
            return Ok((header, HEADER_LEN));
        }
        if src.len() < SPLIT_HEADER_LEN {
            return Err(FrameError::InsufficientSpace {
                required: SPLIT_HEADER_LEN,
                available: src.len(),
            });
        }
        header.total = be_u16(&src[12..14]);
        header.index = be_u16(&src[14..16]);
        Ok((header, SPLIT_HEADER_LEN))
    }

    /// Check sub-packet fields for self-consistency.
    ///
    /// Must pass before a split header is trusted for reassembly.
    pub fn verify(&self) -> Result<()> {
        if !self.is_split() {
            return Ok(());
        }
        if self.total < 2 {
            return Err(FrameError::InvalidTotal(self.total));
        }
        if self.index < 1 || self.index > self.total {
            return Err(FrameError::InvalidIndex {
                index: self.index,
                total: self.total,
            });
        }
        Ok(())
    }
}

fn be_u16(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}
