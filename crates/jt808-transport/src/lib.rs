//! Byte-stream transport for JT808 terminal links.
//!
//! The framing layer only needs a blocking `Read + Write` stream. This crate
//! provides the TCP flavour used by terminals and platforms:
//! - [`TcpTransport`] binds a listening socket and accepts terminals
//! - [`TerminalStream`] is the connected stream handed to the frame layer

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::TerminalStream;
pub use tcp::TcpTransport;
