use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::checksum::{checksum, Checksum};
use crate::error::{FrameError, Result};
use crate::escape::{escape_into, max_escaped_len, unescape_with_report, UnescapeReport, FLAG};
use crate::header::{Header, HEADER_LEN, MAX_BODY_LENGTH, SPLIT_HEADER_LEN};

/// Largest escaped span that can legally sit between two markers.
pub const MAX_ESCAPED_FRAME_LEN: usize = max_escaped_len(SPLIT_HEADER_LEN + MAX_BODY_LENGTH + 1);

/// One decoded frame: header plus body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The frame header; its body length always matches `body`.
    pub header: Header,
    /// The frame body.
    pub body: Bytes,
}

impl Frame {
    /// Create a frame, filling the header's body length from `body`.
    pub fn new(mut header: Header, body: impl Into<Bytes>) -> Result<Self> {
        let body = body.into();
        header.set_body_length(body.len())?;
        Ok(Self { header, body })
    }

    /// Size on the wire before escaping, markers included.
    pub fn unescaped_len(&self) -> usize {
        2 + self.header.encoded_len() + self.body.len() + 1
    }

    /// Append this frame's wire form to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        encode_frame(&self.header, &self.body, dst)
    }
}

/// Encode one frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────┬──────────────┬──────────────┬──────────┬──────┐
/// │ 0x7E │ Header       │ Body         │ Checksum │ 0x7E │
/// │      │ (12/16B)     │ (0..=1023B)  │ (1B)     │      │
/// └──────┴──────────────┴──────────────┴──────────┴──────┘
///         └──────────── escaped ──────────────────┘
/// ```
///
/// The header's body length is taken from `body`; the checksum covers the
/// unescaped header and body.
pub fn encode_frame(header: &Header, body: &[u8], dst: &mut BytesMut) -> Result<()> {
    let mut header = *header;
    header.set_body_length(body.len())?;

    let mut head = [0u8; SPLIT_HEADER_LEN];
    let head_len = header.encode(&mut head)?;
    let head = &head[..head_len];

    let mut sum = Checksum::new();
    sum.update(head).update(body);

    dst.reserve(2 + max_escaped_len(head_len + body.len() + 1));
    dst.put_u8(FLAG);
    escape_into(head, dst);
    escape_into(body, dst);
    escape_into(&[sum.value()], dst);
    dst.put_u8(FLAG);
    Ok(())
}

/// Parse the bytes strictly between two markers into a frame.
///
/// Unescapes, verifies the trailing checksum, decodes the header and checks
/// the declared body length. Sub-packet fields are not verified here.
pub fn parse_frame(raw: &[u8]) -> Result<Frame> {
    let (frame, report) = parse_frame_with_report(raw)?;
    if report.stray_escapes > 0 {
        debug!(
            count = report.stray_escapes,
            "passing through unrecognised escape sequences"
        );
    }
    Ok(frame)
}

/// Like [`parse_frame`], also returning what unescaping found.
pub fn parse_frame_with_report(raw: &[u8]) -> Result<(Frame, UnescapeReport)> {
    let mut buf = BytesMut::zeroed(raw.len());
    let report = unescape_with_report(raw, &mut buf)?;
    buf.truncate(report.written);

    let Some((&received, content)) = buf.split_last() else {
        return Err(FrameError::InsufficientSpace {
            required: HEADER_LEN + 1,
            available: 0,
        });
    };

    let computed = checksum(content);
    if computed != received {
        return Err(FrameError::ChecksumMismatch { computed, received });
    }

    let (header, consumed) = Header::decode(content)?;
    let actual = content.len() - consumed;
    if actual != header.body_length() {
        return Err(FrameError::BodyLengthMismatch {
            declared: header.body_length(),
            actual,
        });
    }

    let mut content = buf.freeze();
    content.truncate(report.written - 1);
    let frame = Frame {
        header,
        body: content.slice(consumed..),
    };
    Ok((frame, report))
}

/// Decode one frame from a stream buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// Bytes before the first marker are discarded, empty marker pairs are
/// skipped, and the closing marker is left in place because some terminals
/// share one marker between adjacent frames.
///
/// A frame that fails to parse is consumed before the error is returned, so
/// the next call continues with the following frame.
pub fn decode_frame(src: &mut BytesMut, max_body_length: usize) -> Result<Option<Frame>> {
    let mut discarded = 0;
    let Some(raw) = take_span(src, &mut discarded)? else {
        return Ok(None);
    };
    let frame = parse_frame(&raw)?;
    check_body_limit(&frame, max_body_length)?;
    Ok(Some(frame))
}

/// Cut the next marker-delimited span out of `src`, markers excluded.
///
/// The opening marker is consumed and the closing one stays in `src`.
/// Every byte dropped while resynchronising is added to `discarded`; empty
/// marker pairs count as one byte each.
pub(crate) fn take_span(src: &mut BytesMut, discarded: &mut usize) -> Result<Option<BytesMut>> {
    loop {
        let Some(start) = src.iter().position(|&b| b == FLAG) else {
            if !src.is_empty() {
                debug!(discarded = src.len(), "discarding bytes outside any frame");
                *discarded += src.len();
                src.clear();
            }
            return Ok(None);
        };
        if start > 0 {
            debug!(discarded = start, "discarding bytes before frame marker");
            *discarded += start;
            src.advance(start);
        }

        let Some(len) = src[1..].iter().position(|&b| b == FLAG) else {
            let pending = src.len() - 1;
            if pending > MAX_ESCAPED_FRAME_LEN {
                src.advance(1);
                return Err(FrameError::FrameTooLarge {
                    size: pending,
                    max: MAX_ESCAPED_FRAME_LEN,
                });
            }
            return Ok(None); // Need more data
        };

        if len == 0 {
            *discarded += 1;
            src.advance(1);
            continue;
        }

        let mut raw = src.split_to(1 + len);
        if len > MAX_ESCAPED_FRAME_LEN {
            return Err(FrameError::FrameTooLarge {
                size: len,
                max: MAX_ESCAPED_FRAME_LEN,
            });
        }
        raw.advance(1);
        return Ok(Some(raw));
    }
}

pub(crate) fn check_body_limit(frame: &Frame, max_body_length: usize) -> Result<()> {
    if frame.body.len() > max_body_length {
        return Err(FrameError::PayloadTooLarge {
            size: frame.body.len(),
            max: max_body_length,
        });
    }
    Ok(())
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum body size per frame in bytes. Default: 1023.
    pub max_body_length: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_body_length: MAX_BODY_LENGTH,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
