use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};

use jt808_frame::{FrameConfig, FrameReader, FrameWriter};
use jt808_transport::TcpTransport;
use tracing::info;

use crate::connection::{Connection, TcpConnection};
use crate::error::Result;
use crate::session::{Session, SessionConfig};

/// Listens for and accepts terminal connections.
pub struct TerminalListener {
    transport: TcpTransport,
    frame_config: FrameConfig,
    session_config: SessionConfig,
    next_connection_id: AtomicU64,
}

impl TerminalListener {
    /// Bind to a TCP address.
    pub fn bind(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<Self> {
        let transport = TcpTransport::bind(addr)?;
        Ok(Self {
            transport,
            frame_config: FrameConfig::default(),
            session_config: SessionConfig::default(),
            next_connection_id: AtomicU64::new(1),
        })
    }

    /// Override frame config for accepted connections.
    pub fn with_frame_config(mut self, config: FrameConfig) -> Self {
        self.frame_config = config;
        self
    }

    /// Override session config for accepted connections.
    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// Accept the next connection with an auto-generated id.
    ///
    /// Each connection gets its own [`Session`].
    pub fn accept(&self) -> Result<TcpConnection> {
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        self.accept_with_id(&format!("conn-{id}"))
    }

    /// Accept the next connection and label it `id`.
    pub fn accept_with_id(&self, id: &str) -> Result<TcpConnection> {
        let stream = self.transport.accept()?;
        let reader_stream = stream.try_clone()?;

        let reader = FrameReader::with_config_stream(reader_stream, self.frame_config.clone())?;
        let writer = FrameWriter::with_config_stream(stream, self.frame_config.clone())?;
        info!(connection = id, "terminal connected");

        Ok(Connection::from_parts(
            id,
            reader,
            writer,
            Session::with_config(self.session_config.clone()),
        ))
    }
}
