//! `tokio_util::codec` adapter for use with `Framed` streams.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};

/// Frame codec for `tokio_util::codec::Framed` and friends.
#[derive(Debug, Clone, Default)]
pub struct Jt808Codec {
    config: FrameConfig,
}

impl Jt808Codec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FrameConfig) -> Self {
        Self { config }
    }
}

impl Decoder for Jt808Codec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        decode_frame(src, self.config.max_body_length)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        // A lone closing marker is the normal end of stream.
        if src.iter().all(|&b| b == crate::escape::FLAG) {
            src.clear();
            return Ok(None);
        }
        Err(FrameError::ConnectionClosed)
    }
}

impl Encoder<Frame> for Jt808Codec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<()> {
        if item.body.len() > self.config.max_body_length {
            return Err(FrameError::PayloadTooLarge {
                size: item.body.len(),
                max: self.config.max_body_length,
            });
        }
        encode_frame(&item.header, &item.body, dst)
    }
}
