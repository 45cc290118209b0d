//! Byte stuffing for the span between frame markers.
//!
//! ```text
//! 0x7E  ->  0x7D 0x02
//! 0x7D  ->  0x7D 0x01
//! ```
//!
//! Unescaping is lenient: a `0x7D` followed by anything other than `0x01` or
//! `0x02` is copied through as the pair, and a trailing lone `0x7D` is copied
//! through as-is. Legacy terminals emit such sequences, so they are counted in
//! [`UnescapeReport`] rather than rejected.

use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Frame delimiter.
pub const FLAG: u8 = 0x7E;

/// Escape prefix.
pub const ESC: u8 = 0x7D;

const ESCAPED_FLAG: u8 = 0x02;
const ESCAPED_ESC: u8 = 0x01;

/// Worst-case escaped size of `len` input bytes.
pub const fn max_escaped_len(len: usize) -> usize {
    len * 2
}

/// Escape `src` into `dst`, returning the number of bytes written.
///
/// `dst` must hold the worst case of `2 * src.len()` bytes, even when the
/// actual output would be shorter.
pub fn escape(src: &[u8], dst: &mut [u8]) -> Result<usize> {
    let required = max_escaped_len(src.len());
    if dst.len() < required {
        return Err(FrameError::InsufficientSpace {
            required,
            available: dst.len(),
        });
    }

    let mut n = 0;
    for &b in src {
        match b {
            FLAG => {
                dst[n] = ESC;
                dst[n + 1] = ESCAPED_FLAG;
                n += 2;
            }
            ESC => {
                dst[n] = ESC;
                dst[n + 1] = ESCAPED_ESC;
                n += 2;
            }
            other => {
                dst[n] = other;
                n += 1;
            }
        }
    }
    Ok(n)
}

/// Escape `src` onto the end of a growable buffer.
pub fn escape_into(src: &[u8], dst: &mut BytesMut) {
    dst.reserve(max_escaped_len(src.len()));

    let mut rest = src;
    while let Some(pos) = rest.iter().position(|&b| b == FLAG || b == ESC) {
        dst.put_slice(&rest[..pos]);
        let code = if rest[pos] == FLAG {
            ESCAPED_FLAG
        } else {
            ESCAPED_ESC
        };
        dst.put_slice(&[ESC, code]);
        rest = &rest[pos + 1..];
    }
    dst.put_slice(rest);
}

/// Outcome of a lenient unescape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnescapeReport {
    /// Bytes written to the destination.
    pub written: usize,
    /// Escape bytes that did not start a recognised pair and were copied
    /// through literally.
    pub stray_escapes: usize,
}

/// Unescape `src` into `dst`, returning the number of bytes written.
///
/// `dst` must hold at least `src.len()` bytes.
pub fn unescape(src: &[u8], dst: &mut [u8]) -> Result<usize> {
    unescape_with_report(src, dst).map(|report| report.written)
}

/// Unescape `src` into `dst`, also counting stray escape bytes.
///
/// The decoded bytes are identical to [`unescape`]; only the report differs.
pub fn unescape_with_report(src: &[u8], dst: &mut [u8]) -> Result<UnescapeReport> {
    if dst.len() < src.len() {
        return Err(FrameError::InsufficientSpace {
            required: src.len(),
            available: dst.len(),
        });
    }

    let mut report = UnescapeReport::default();
    let mut i = 0;
    let mut n = 0;
    while i < src.len() {
        let b = src[i];
        if b != ESC || i + 1 == src.len() {
            if b == ESC {
                report.stray_escapes += 1;
            }
            dst[n] = b;
            n += 1;
            i += 1;
            continue;
        }

        match src[i + 1] {
            ESCAPED_FLAG => {
                dst[n] = FLAG;
                n += 1;
            }
            ESCAPED_ESC => {
                dst[n] = ESC;
                n += 1;
            }
            other => {
                // Unknown pair: both bytes pass through untouched.
                report.stray_escapes += 1;
                dst[n] = ESC;
                dst[n + 1] = other;
                n += 2;
            }
        }
        i += 2;
    }

    report.written = n;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn escape_vec(src: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; max_escaped_len(src.len())];
        let n = escape(src, &mut out).unwrap();
        out.truncate(n);
        out
    }

    fn unescape_vec(src: &[u8]) -> (Vec<u8>, usize) {
        let mut out = vec![0u8; src.len()];
        let report = unescape_with_report(src, &mut out).unwrap();
        out.truncate(report.written);
        (out, report.stray_escapes)
    }

    #[test]
    fn escapes_both_markers() {
        let body = [0x01, 0x7E, 0x02, 0x7D, 0x03];
        let escaped = escape_vec(&body);
        assert_eq!(escaped, vec![0x01, 0x7D, 0x02, 0x02, 0x7D, 0x01, 0x03]);

        let (restored, stray) = unescape_vec(&escaped);
        assert_eq!(restored, body);
        assert_eq!(stray, 0);
    }

    #[test]
    fn escape_into_matches_slice_escape() {
        let body = [0x7E, 0x7E, 0x30, 0x7D, 0x7D, 0x31, 0x7E];
        let mut buf = BytesMut::from(&b"pre"[..]);
        escape_into(&body, &mut buf);

        let mut expected = b"pre".to_vec();
        expected.extend(escape_vec(&body));
        assert_eq!(buf.as_ref(), expected.as_slice());
    }

    #[test]
    fn escape_requires_worst_case_capacity() {
        // No marker bytes at all, but the worst case is still demanded.
        let mut dst = [0u8; 5];
        let err = escape(b"abc", &mut dst).unwrap_err();
        assert!(matches!(
            err,
            FrameError::InsufficientSpace {
                required: 6,
                available: 5
            }
        ));
    }

    #[test]
    fn unescape_requires_input_sized_capacity() {
        let mut dst = [0u8; 2];
        let err = unescape(&[0x7D, 0x01, 0x00], &mut dst).unwrap_err();
        assert!(matches!(err, FrameError::InsufficientSpace { .. }));
    }

    #[test]
    fn trailing_escape_passes_through() {
        let (restored, stray) = unescape_vec(&[0x10, 0x7D]);
        assert_eq!(restored, vec![0x10, 0x7D]);
        assert_eq!(stray, 1);
    }

    #[test]
    fn unknown_pair_passes_through_as_pair() {
        let (restored, stray) = unescape_vec(&[0x7D, 0x05, 0x06]);
        assert_eq!(restored, vec![0x7D, 0x05, 0x06]);
        assert_eq!(stray, 1);

        // The second byte of an unknown pair is not rescanned.
        let (restored, stray) = unescape_vec(&[0x7D, 0x7D, 0x01]);
        assert_eq!(restored, vec![0x7D, 0x7D, 0x01]);
        assert_eq!(stray, 1);
    }

    #[test]
    fn empty_span() {
        assert!(escape_vec(&[]).is_empty());
        assert_eq!(unescape(&[], &mut []).unwrap(), 0);
    }

    proptest! {
        #[test]
        fn roundtrip(data in any::<Vec<u8>>()) {
            let escaped = escape_vec(&data);
            let (restored, stray) = unescape_vec(&escaped);
            prop_assert_eq!(restored, data);
            prop_assert_eq!(stray, 0);
        }

        #[test]
        fn escaped_output_has_no_flag(data in any::<Vec<u8>>()) {
            let escaped = escape_vec(&data);
            prop_assert!(!escaped.contains(&FLAG));
            prop_assert!(escaped.len() <= max_escaped_len(data.len()));
        }

        #[test]
        fn unescape_never_grows(data in any::<Vec<u8>>()) {
            let (restored, _) = unescape_vec(&data);
            prop_assert!(restored.len() <= data.len());
        }
    }
}
