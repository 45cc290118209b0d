use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use jt808_transport::TerminalStream;
use tracing::trace;

use crate::codec::{encode_frame, Frame, FrameConfig, MAX_ESCAPED_FRAME_LEN};
use crate::error::{FrameError, Result};
use crate::header::Header;

/// What a [`FrameWriter`] has put on its stream so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteStats {
    /// Frames written and flushed.
    pub frames: u64,
    /// Wire bytes, markers included.
    pub wire_bytes: u64,
    /// Extra bytes added by escaping `0x7E` and `0x7D`.
    pub stuffed_bytes: u64,
}

/// Writes frames to a terminal byte stream.
///
/// Each frame is escaped into an internal buffer, written in full and then
/// flushed, so the stream sees exactly one flush per frame.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    max_body_length: usize,
    stats: WriteStats,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(MAX_ESCAPED_FRAME_LEN + 2),
            max_body_length: config.max_body_length,
            stats: WriteStats::default(),
        }
    }

    /// Write an already built frame.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<usize> {
        self.send(&frame.header, frame.body.as_ref())
    }

    /// Encode, write and flush one frame. Returns its wire length.
    ///
    /// The header's body length is filled from `body`. Nothing reaches the
    /// stream when the body is over the configured limit.
    pub fn send(&mut self, header: &Header, body: &[u8]) -> Result<usize> {
        if body.len() > self.max_body_length {
            return Err(FrameError::PayloadTooLarge {
                size: body.len(),
                max: self.max_body_length,
            });
        }

        self.buf.clear();
        encode_frame(header, body, &mut self.buf)?;
        let wire_len = self.buf.len();
        let stuffed = wire_len - (2 + header.encoded_len() + body.len() + 1);

        self.put_buffered()?;

        self.stats.frames += 1;
        self.stats.wire_bytes += wire_len as u64;
        self.stats.stuffed_bytes += stuffed as u64;
        trace!(
            message_id = header.message_id,
            serial_number = header.serial_number,
            wire_len,
            stuffed,
            "frame written"
        );
        Ok(wire_len)
    }

    /// Counters for this stream.
    pub fn stats(&self) -> &WriteStats {
        &self.stats
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    fn put_buffered(&mut self) -> Result<()> {
        match self.inner.write_all(&self.buf) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::WriteZero => {
                return Err(FrameError::ConnectionClosed);
            }
            Err(err) => return Err(err.into()),
        }
        self.inner.flush()?;
        Ok(())
    }
}

impl FrameWriter<TerminalStream> {
    /// Wrap a terminal stream, applying the configured write timeout.
    pub fn with_config_stream(inner: TerminalStream, config: FrameConfig) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}
