//! JT808 terminal protocol framing.
//!
//! JT808 is the link protocol spoken between vehicle GNSS terminals and
//! monitoring platforms. This crate covers the wire layer: marker framing,
//! byte stuffing, the XOR checksum, the bit-packed header, sub-packet
//! splitting and reassembly. Message body semantics are left to the caller.
//!
//! # Crate Structure
//!
//! - [`transport`]: blocking TCP byte streams
//! - [`frame`]: header, codec, stream reader and writer, reassembly buffer
//! - [`session`]: serial numbers, split sending, reassembly bookkeeping
//!   (behind the `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use jt808_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use jt808_frame::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use jt808_session::*;
}
