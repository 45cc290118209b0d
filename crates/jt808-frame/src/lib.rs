//! Wire framing for the JT808 vehicle-terminal protocol.
//!
//! Every frame on the wire is:
//! - a `0x7E` marker
//! - a 12-byte header (16 bytes when the split flag is set)
//! - a body of at most 1023 bytes
//! - a one-byte XOR checksum over header and body
//! - a closing `0x7E` marker
//!
//! Everything between the markers is byte-stuffed so the marker value never
//! appears inside a frame. Payloads larger than one body are split into
//! sub-packets on send and reassembled on receive.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod checksum;
pub mod codec;
pub mod error;
pub mod escape;
pub mod header;
pub mod reader;
pub mod reassembly;
pub mod split;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::Jt808Codec;
pub use checksum::{checksum, Checksum};
pub use codec::{
    decode_frame, encode_frame, parse_frame, parse_frame_with_report, Frame, FrameConfig,
    MAX_ESCAPED_FRAME_LEN,
};
pub use error::{FrameError, Result};
pub use escape::{
    escape, escape_into, max_escaped_len, unescape, unescape_with_report, UnescapeReport, ESC,
    FLAG,
};
pub use header::{
    Header, TerminalId, HEADER_LEN, MAX_BODY_LENGTH, SPLIT_HEADER_LEN, TERMINAL_ID_DIGITS,
};
pub use reader::{FrameReader, ReadStats};
pub use reassembly::ReassemblyBuffer;
pub use split::{split, Split, SubPacket};
pub use writer::{FrameWriter, WriteStats};
