/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header does not start with the magic prefix.
    #[error("framing error: header prefix {found:#06X} != 0xAABB")]
    InvalidMagic { found: u16 },

    /// The payload does not fit the 16-bit length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The stream ended inside a frame.
    #[error("partial frame: expected {expected} bytes, received {received}")]
    PartialFrame { expected: usize, received: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection between frames.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
