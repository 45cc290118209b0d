use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use jt808_transport::TerminalStream;
use tracing::debug;

use crate::codec::{
    check_body_limit, parse_frame_with_report, take_span, Frame, FrameConfig,
    MAX_ESCAPED_FRAME_LEN,
};
use crate::error::{FrameError, Result};
use crate::escape::FLAG;

/// One read can hold a worst-case frame.
const READ_CHUNK_SIZE: usize = MAX_ESCAPED_FRAME_LEN + 2;

/// What a [`FrameReader`] has seen on its stream so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadStats {
    /// Frames returned to the caller.
    pub frames: u64,
    /// Frames dropped for a checksum, header, length or size fault.
    pub faults: u64,
    /// Bytes skipped while looking for a marker. Each empty marker pair
    /// counts as one byte.
    pub discarded: u64,
    /// Escape bytes in accepted frames that did not start `7D 01` or
    /// `7D 02` and were kept as data.
    pub stray_escapes: u64,
}

/// Reads complete frames from a terminal byte stream.
///
/// Bytes are pulled in chunks and cut at `0x7E` markers. Noise between
/// frames is skipped, a marker shared by two adjacent frames is used for
/// both, and every frame is checksum-verified before it is returned.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    stats: ReadStats,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(2 * READ_CHUNK_SIZE),
            config,
            stats: ReadStats::default(),
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// A faulty frame is consumed and reported as an error; calling again
    /// continues with the next frame. End of stream yields
    /// [`FrameError::ConnectionClosed`], whether or not a frame was cut off.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            let mut discarded = 0;
            let span = take_span(&mut self.buf, &mut discarded);
            self.stats.discarded += discarded as u64;

            match span {
                Ok(Some(raw)) => return self.accept(&raw),
                Ok(None) => {}
                Err(err) => {
                    self.stats.faults += 1;
                    return Err(err);
                }
            }

            if !self.fill()? {
                if self.buf.iter().any(|&b| b != FLAG) {
                    debug!(pending = self.buf.len(), "stream ended inside a frame");
                }
                return Err(FrameError::ConnectionClosed);
            }
        }
    }

    /// Counters for this stream.
    pub fn stats(&self) -> &ReadStats {
        &self.stats
    }

    /// Bytes read from the stream but not yet part of a returned frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    fn accept(&mut self, raw: &[u8]) -> Result<Frame> {
        let max_body_length = self.config.max_body_length;
        let parsed = parse_frame_with_report(raw).and_then(|(frame, report)| {
            check_body_limit(&frame, max_body_length)?;
            Ok((frame, report))
        });

        let (frame, report) = match parsed {
            Ok(parsed) => parsed,
            Err(err) => {
                self.stats.faults += 1;
                return Err(err);
            }
        };

        self.stats.frames += 1;
        if report.stray_escapes > 0 {
            self.stats.stray_escapes += report.stray_escapes as u64;
            debug!(
                message_id = frame.header.message_id,
                serial_number = frame.header.serial_number,
                count = report.stray_escapes,
                "passing through unrecognised escape sequences"
            );
        }
        Ok(frame)
    }

    /// Append one read's worth of bytes. Returns `false` at end of stream.
    fn fill(&mut self) -> Result<bool> {
        let start = self.buf.len();
        self.buf.resize(start + READ_CHUNK_SIZE, 0);
        loop {
            match self.inner.read(&mut self.buf[start..]) {
                Ok(n) => {
                    self.buf.truncate(start + n);
                    return Ok(n > 0);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.buf.truncate(start);
                    return Err(err.into());
                }
            }
        }
    }
}

impl FrameReader<TerminalStream> {
    /// Wrap a terminal stream, applying the configured read timeout.
    pub fn with_config_stream(inner: TerminalStream, config: FrameConfig) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::{self, Cursor};

    use bytes::BufMut;

    use super::*;
    use crate::checksum::checksum;
    use crate::codec::encode_frame;
    use crate::escape::{escape_into, ESC};
    use crate::header::{Header, TerminalId, SPLIT_HEADER_LEN};

    fn header(serial: u16) -> Header {
        Header::new(0x0102, TerminalId::from_bcd([0, 0, 0, 0, 0x12, 0x34]))
            .with_serial_number(serial)
    }

    fn frame_wire(serial: u16, body: &[u8]) -> Vec<u8> {
        let mut wire = BytesMut::new();
        encode_frame(&header(serial), body, &mut wire).unwrap();
        wire.to_vec()
    }

    /// Same frames, but adjacent ones share a single marker.
    fn shared_marker_wire(frames: &[(u16, &[u8])]) -> Vec<u8> {
        let mut wire = Vec::new();
        for &(serial, body) in frames {
            let one = frame_wire(serial, body);
            let skip = usize::from(wire.last() == Some(&FLAG));
            wire.extend_from_slice(&one[skip..]);
        }
        wire
    }

    /// Hands out bytes one per read.
    struct Dribble {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for Dribble {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match (self.bytes.get(self.pos), buf.first_mut()) {
                (Some(&b), Some(slot)) => {
                    *slot = b;
                    self.pos += 1;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    /// Plays back a fixed sequence of read outcomes, then reports EOF.
    struct Scripted(VecDeque<io::Result<Vec<u8>>>);

    impl Scripted {
        fn new(steps: impl IntoIterator<Item = io::Result<Vec<u8>>>) -> Self {
            Self(steps.into_iter().collect())
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                None => Ok(0),
                Some(Err(err)) => Err(err),
                Some(Ok(chunk)) => {
                    assert!(chunk.len() <= buf.len());
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
            }
        }
    }

    #[test]
    fn read_single_frame() {
        let mut reader = FrameReader::new(Cursor::new(frame_wire(1, b"hello")));
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.header.message_id, 0x0102);
        assert_eq!(frame.header.terminal_id.to_string(), "1234");
        assert_eq!(frame.body.as_ref(), b"hello");
        assert_eq!(reader.stats().frames, 1);
    }

    #[test]
    fn shared_markers_fed_one_byte_at_a_time() {
        let frames: [(u16, &[u8]); 3] = [(1, b"one"), (2, &[FLAG, ESC]), (3, b"three")];
        let mut reader = FrameReader::new(Dribble {
            bytes: shared_marker_wire(&frames),
            pos: 0,
        });

        for (serial, body) in frames {
            let frame = reader.read_frame().unwrap();
            assert_eq!(frame.header.serial_number, serial);
            assert_eq!(frame.body.as_ref(), body);
        }
        assert!(matches!(reader.read_frame(), Err(FrameError::ConnectionClosed)));
        assert_eq!(
            *reader.stats(),
            ReadStats {
                frames: 3,
                ..ReadStats::default()
            }
        );
    }

    #[test]
    fn escape_pair_split_across_reads() {
        let wire = frame_wire(6, &[0x01, FLAG, 0x02]);
        let cut = wire.iter().position(|&b| b == ESC).unwrap() + 1;
        assert_eq!(wire[cut], 0x02);

        let mut reader = FrameReader::new(Scripted::new([
            Ok(wire[..cut].to_vec()),
            Ok(wire[cut..].to_vec()),
        ]));
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.body.as_ref(), &[0x01, FLAG, 0x02]);
    }

    #[test]
    fn worst_case_frame_in_one_read() {
        let body = vec![FLAG; 1023];
        let mut reader = FrameReader::new(Cursor::new(frame_wire(9, &body)));

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.body.as_ref(), body.as_slice());
        // Only the closing marker is left over.
        assert_eq!(reader.buffered(), 1);
    }

    #[test]
    fn noise_and_empty_marker_pairs_are_counted() {
        let mut wire = vec![0x55, 0x66, FLAG];
        wire.extend(frame_wire(1, b"sync"));
        wire.extend([0x01, 0x02]);

        let mut reader = FrameReader::new(Cursor::new(wire));
        assert_eq!(reader.read_frame().unwrap().body.as_ref(), b"sync");
        assert_eq!(reader.stats().discarded, 3);

        // Trailing closing marker is reused as an opener; the two bytes after
        // it never close, so the stream ends inside a frame.
        assert!(matches!(reader.read_frame(), Err(FrameError::ConnectionClosed)));
    }

    #[test]
    fn stray_escape_is_kept_and_counted() {
        let mut h = header(5);
        h.set_body_length(2).unwrap();
        let mut head = [0u8; SPLIT_HEADER_LEN];
        let n = h.encode(&mut head).unwrap();
        let mut content = head[..n].to_vec();
        content.extend([ESC, 0x05]);
        let sum = checksum(&content);

        let mut wire = BytesMut::new();
        wire.put_u8(FLAG);
        escape_into(&head[..n], &mut wire);
        wire.put_slice(&[ESC, 0x05]);
        escape_into(&[sum], &mut wire);
        wire.put_u8(FLAG);

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.body.as_ref(), &[ESC, 0x05]);
        assert_eq!(reader.stats().stray_escapes, 1);
    }

    #[test]
    fn corrupt_frame_counted_then_stream_continues() {
        let mut wire = BytesMut::new();
        encode_frame(&header(1), b"bad", &mut wire).unwrap();
        // Flip a body byte; the checksum no longer matches.
        let pos = wire.len() - 3;
        wire[pos] ^= 0x20;
        encode_frame(&header(2), b"good", &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ChecksumMismatch { .. }));
        assert!(err.is_frame_fault());

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.body.as_ref(), b"good");
        assert_eq!((reader.stats().frames, reader.stats().faults), (1, 1));
    }

    #[test]
    fn body_over_configured_limit_is_a_fault() {
        let config = FrameConfig {
            max_body_length: 4,
            ..FrameConfig::default()
        };
        let wire = [frame_wire(1, b"too long"), frame_wire(2, b"ok")].concat();
        let mut reader = FrameReader::with_config(Cursor::new(wire), config);

        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 8, max: 4 }));
        assert_eq!(reader.read_frame().unwrap().body.as_ref(), b"ok");
        assert_eq!(reader.stats().faults, 1);
    }

    #[test]
    fn unterminated_run_resyncs_on_next_marker() {
        let mut wire = vec![FLAG];
        wire.resize(MAX_ESCAPED_FRAME_LEN + 2, 0x11);
        wire.extend(frame_wire(3, b"after"));

        let mut reader = FrameReader::new(Cursor::new(wire));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { .. }));
        assert_eq!(reader.read_frame().unwrap().body.as_ref(), b"after");
    }

    #[test]
    fn clean_close_after_last_frame() {
        let mut reader = FrameReader::new(Cursor::new(frame_wire(1, b"last")));
        reader.read_frame().unwrap();

        assert!(matches!(reader.read_frame(), Err(FrameError::ConnectionClosed)));
        let mut empty = FrameReader::new(Cursor::new(Vec::new()));
        assert!(matches!(empty.read_frame(), Err(FrameError::ConnectionClosed)));
    }

    #[test]
    fn close_mid_frame() {
        let mut wire = frame_wire(1, b"cut short");
        wire.truncate(wire.len() - 4);

        let mut reader = FrameReader::new(Cursor::new(wire));
        assert!(matches!(reader.read_frame(), Err(FrameError::ConnectionClosed)));
        assert_eq!(reader.stats().frames, 0);
    }

    #[test]
    fn interrupted_read_is_retried_and_would_block_is_not() {
        let wire = frame_wire(8, b"ok");
        let mut reader = FrameReader::new(Scripted::new([
            Err(io::Error::from(ErrorKind::Interrupted)),
            Ok(wire[..4].to_vec()),
            Err(io::Error::from(ErrorKind::WouldBlock)),
            Ok(wire[4..].to_vec()),
        ]));

        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(ref e) if e.kind() == ErrorKind::WouldBlock));
        assert!(!err.is_frame_fault());

        // Bytes from before the timeout are kept.
        assert_eq!(reader.buffered(), 4);
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.header.serial_number, 8);
    }

    #[test]
    fn roundtrip_over_tcp() {
        let listener = jt808_transport::TcpTransport::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr();

        let server = std::thread::spawn(move || {
            let stream = listener.accept().unwrap();
            let config = FrameConfig {
                read_timeout: Some(std::time::Duration::from_secs(5)),
                ..FrameConfig::default()
            };
            let mut reader = FrameReader::with_config_stream(stream, config).unwrap();
            let frame = reader.read_frame().unwrap();
            assert_eq!(frame.header.serial_number, 11);
            assert_eq!(frame.body.as_ref(), &[FLAG, b't', b'c', b'p']);
        });

        let stream = jt808_transport::TcpTransport::connect(addr).unwrap();
        let mut writer = crate::writer::FrameWriter::new(stream);
        writer.send(&header(11), &[FLAG, b't', b'c', b'p']).unwrap();

        server.join().unwrap();
    }
}
