//! Partitioning of outbound payloads into bounded sub-packets.

use crate::error::{FrameError, Result};
use crate::header::{Header, MAX_BODY_LENGTH};

/// Placement of one frame body within an outbound payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubPacket {
    /// Bytes of payload carried by this frame.
    pub body_length: usize,
    /// Number of frames composing the message (1 when unsplit).
    pub total: u16,
    /// 1-based position of this frame.
    pub index: u16,
}

impl SubPacket {
    /// Whether the frame carries the split flag.
    pub fn is_split(&self) -> bool {
        self.total > 1
    }

    /// Apply body length and sub-packet fields to a header.
    pub fn apply(&self, header: &mut Header) -> Result<()> {
        header.set_body_length(self.body_length)?;
        if self.is_split() {
            header.set_sub_packet(self.total, self.index);
        } else {
            header.clear_sub_packet();
        }
        Ok(())
    }
}

/// Iterator over the sub-packets of one payload, in index order.
#[derive(Debug, Clone)]
pub struct Split {
    payload_length: usize,
    max_body: usize,
    total: u16,
    // Wider than `total` so the cursor can step past u16::MAX.
    next: u32,
}

/// Partition `payload_length` bytes into frames of at most `max_body` bytes.
///
/// A payload that fits one frame (including an empty one) yields a single
/// unsplit sub-packet. Otherwise every sub-packet carries `max_body` bytes
/// except the last, which carries the remainder.
pub fn split(payload_length: usize, max_body: usize) -> Result<Split> {
    if max_body == 0 || max_body > MAX_BODY_LENGTH {
        return Err(FrameError::InvalidBodyLimit(max_body));
    }

    let total = payload_length.div_ceil(max_body).max(1);
    let total = u16::try_from(total).map_err(|_| FrameError::PayloadTooLarge {
        size: payload_length,
        max: usize::from(u16::MAX) * max_body,
    })?;

    Ok(Split {
        payload_length,
        max_body,
        total,
        next: 1,
    })
}

impl Split {
    /// Number of frames the payload needs.
    pub fn total(&self) -> u16 {
        self.total
    }
}

impl Iterator for Split {
    type Item = SubPacket;

    fn next(&mut self) -> Option<SubPacket> {
        let index = u16::try_from(self.next)
            .ok()
            .filter(|&index| index <= self.total)?;
        self.next += 1;

        let body_length = if index == self.total {
            self.payload_length - self.max_body * (usize::from(self.total) - 1)
        } else {
            self.max_body
        };

        Some(SubPacket {
            body_length,
            total: self.total,
            index,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (u32::from(self.total) + 1).saturating_sub(self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Split {}
