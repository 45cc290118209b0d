//! Session orchestration for JT808 terminal links.
//!
//! This is the layer applications talk to. A [`Session`] owns the outbound
//! serial-number counter and the reassembly state for split messages; a
//! [`Connection`] pairs a session with a frame reader and writer over one
//! stream.

pub mod connection;
pub mod connector;
pub mod error;
pub mod listener;
pub mod session;

pub use connection::{Connection, TcpConnection};
pub use connector::{connect, connect_with_config};
pub use error::{Result, SessionError};
pub use listener::TerminalListener;
pub use session::{Envelope, Message, ReassemblyKey, Received, Session, SessionConfig};
