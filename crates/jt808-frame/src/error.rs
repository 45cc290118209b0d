/// Errors that can occur during frame encoding/decoding and reassembly.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The destination (or source) buffer is too small for the operation.
    #[error("insufficient space ({available} bytes available, {required} required)")]
    InsufficientSpace { required: usize, available: usize },

    /// A terminal identifier contains a non-decimal character.
    #[error("invalid terminal id digit {0:?}")]
    InvalidDigit(char),

    /// A split header declares fewer than two sub-packets.
    #[error("invalid sub-packet total {0} (must be at least 2)")]
    InvalidTotal(u16),

    /// A split header carries an index outside `1..=total`.
    #[error("invalid sub-packet index {index} (total {total})")]
    InvalidIndex { index: u16, total: u16 },

    /// The trailing checksum does not match the frame contents.
    #[error("checksum mismatch (computed {computed:#04x}, received {received:#04x})")]
    ChecksumMismatch { computed: u8, received: u8 },

    /// A sub-packet addresses a slot outside the reassembly buffer.
    #[error("sub-packet index {index} out of range (total {total})")]
    IndexOutOfRange { index: u16, total: u16 },

    /// A reassembly buffer was assembled before every slot was filled.
    #[error("reassembly not ready ({filled} of {total} sub-packets)")]
    NotReady { filled: usize, total: usize },

    /// The header's body length disagrees with the bytes actually carried.
    #[error("body length mismatch (header says {declared}, frame carries {actual})")]
    BodyLengthMismatch { declared: usize, actual: usize },

    /// The payload or body exceeds what the wire format can carry.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The per-frame body limit is outside `1..=1023`.
    #[error("invalid body limit {0} (must be 1..=1023)")]
    InvalidBodyLimit(usize),

    /// No closing marker arrived within the largest possible frame.
    #[error("frame too large ({size} bytes without closing marker, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// Whether this error concerns a single frame only.
    ///
    /// Frame faults leave the stream and any reassembly state usable; the
    /// offending frame is dropped and reading can continue.
    pub fn is_frame_fault(&self) -> bool {
        !matches!(self, FrameError::Io(_) | FrameError::ConnectionClosed)
    }
}

impl From<jt808_transport::TransportError> for FrameError {
    fn from(err: jt808_transport::TransportError) -> Self {
        use jt808_transport::TransportError;
        match err {
            TransportError::Io(io) | TransportError::Accept(io) => FrameError::Io(io),
            TransportError::Bind { source, .. } | TransportError::Connect { source, .. } => {
                FrameError::Io(source)
            }
            TransportError::Shutdown => FrameError::ConnectionClosed,
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
