/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] jt808_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] jt808_frame::FrameError),

    /// The payload source failed while a sub-packet body was being read.
    #[error("payload source error: {0}")]
    Payload(#[source] std::io::Error),

    /// The remote end went away.
    #[error("terminal disconnected: {0}")]
    Disconnected(String),
}

impl SessionError {
    /// Whether the underlying stream is unusable after this error.
    ///
    /// Non-fatal errors concern a single frame or a single send; the session
    /// and its other reassembly buffers are unaffected.
    pub fn is_fatal(&self) -> bool {
        match self {
            SessionError::Transport(_) | SessionError::Disconnected(_) => true,
            SessionError::Frame(err) => !err.is_frame_fault(),
            SessionError::Payload(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
