use std::net::ToSocketAddrs;

use jt808_frame::{FrameConfig, FrameReader, FrameWriter};
use jt808_transport::TcpTransport;
use tracing::info;

use crate::connection::{Connection, TcpConnection};
use crate::error::Result;
use crate::session::{Session, SessionConfig};

/// Connect to a JT808 endpoint with default configuration.
pub fn connect(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<TcpConnection> {
    connect_with_config(addr, FrameConfig::default(), SessionConfig::default())
}

/// Connect with explicit frame and session configuration.
pub fn connect_with_config(
    addr: impl ToSocketAddrs + std::fmt::Debug,
    frame_config: FrameConfig,
    session_config: SessionConfig,
) -> Result<TcpConnection> {
    let stream = TcpTransport::connect(addr)?;
    let reader_stream = stream.try_clone()?;
    let id = stream.peer_addr()?.to_string();

    let reader = FrameReader::with_config_stream(reader_stream, frame_config.clone())?;
    let writer = FrameWriter::with_config_stream(stream, frame_config)?;
    info!(peer = %id, "connected");

    Ok(Connection::from_parts(
        id,
        reader,
        writer,
        Session::with_config(session_config),
    ))
}
