use std::io::{Read, Write};
use std::net::SocketAddr;

use jt808_frame::{FrameError, FrameReader, FrameWriter, ReadStats, WriteStats};
use jt808_transport::TerminalStream;
use tracing::warn;

use crate::error::{Result, SessionError};
use crate::session::{Envelope, Message, Received, Session};

/// A connection over TCP.
pub type TcpConnection = Connection<TerminalStream, TerminalStream>;

/// One terminal link: a frame reader and writer driven by a [`Session`].
pub struct Connection<R, W> {
    id: String,
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    session: Session,
}

impl<R: Read, W: Write> Connection<R, W> {
    pub fn from_parts(
        id: impl Into<String>,
        reader: FrameReader<R>,
        writer: FrameWriter<W>,
        session: Session,
    ) -> Self {
        Self {
            id: id.into(),
            reader,
            writer,
            session,
        }
    }

    /// Label used in logs for this connection.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Send a message, splitting it if needed. Returns the frame count.
    pub fn send(&mut self, envelope: &Envelope, payload: &[u8]) -> Result<u16> {
        self.session.send_bytes(&mut self.writer, envelope, payload)
    }

    /// Send `payload_length` bytes read from `payload`.
    pub fn send_from<P: Read>(
        &mut self,
        envelope: &Envelope,
        payload: P,
        payload_length: usize,
    ) -> Result<u16> {
        self.session.send(&mut self.writer, envelope, payload, payload_length)
    }

    /// Block until the next complete message arrives.
    ///
    /// Sub-packets are absorbed until their message is complete. Corrupt
    /// frames are logged and skipped; only stream failures are returned.
    pub fn recv(&mut self) -> Result<Message> {
        loop {
            match self.recv_frame() {
                Ok(Received::Complete(message)) => return Ok(message),
                Ok(Received::Pending { .. }) => continue,
                Err(err) if !err.is_fatal() => {
                    warn!(connection = %self.id, error = %err, "dropping bad frame");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Read one frame and feed it to the session.
    pub fn recv_frame(&mut self) -> Result<Received> {
        let frame = match self.reader.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => {
                return Err(SessionError::Disconnected(self.id.clone()));
            }
            Err(err) => return Err(err.into()),
        };
        self.session.receive_frame(frame)
    }

    /// Inbound stream counters.
    pub fn read_stats(&self) -> ReadStats {
        *self.reader.stats()
    }

    /// Outbound stream counters.
    pub fn write_stats(&self) -> WriteStats {
        *self.writer.stats()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Split into reader, writer and session.
    pub fn into_parts(self) -> (FrameReader<R>, FrameWriter<W>, Session) {
        (self.reader, self.writer, self.session)
    }
}

impl TcpConnection {
    /// Address of the remote end.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.writer.get_ref().peer_addr()?)
    }

    /// Shut down both directions of the socket.
    pub fn shutdown(&self) -> Result<()> {
        Ok(self.writer.get_ref().shutdown()?)
    }
}

impl<R, W> std::fmt::Debug for Connection<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
