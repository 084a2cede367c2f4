use std::time::Duration;

use muxstream_frame::FrameError;

use crate::datagram::DatagramError;

/// Errors that end a session.
///
/// Every variant is fatal to the session it occurs in. Unknown datagram
/// types are not errors; they are logged and skipped.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error while connecting.
    #[error("transport error: {0}")]
    Transport(#[from] muxstream_transport::TransportError),

    /// Version exchange failed or the token was unusable.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// A frame header did not start with the magic prefix.
    #[error("framing error: header prefix {found:#06X} != 0xAABB")]
    Framing { found: u16 },

    /// The stream ended inside a frame.
    #[error("partial frame: expected {expected} bytes, received {received}")]
    PartialFrame { expected: usize, received: usize },

    /// The peer closed the connection.
    #[error("peer disconnected")]
    Disconnected,

    /// A datagram body did not match its type's layout.
    #[error("protocol error: {0}")]
    Protocol(#[from] DatagramError),

    /// Any other frame-level failure (oversized payload).
    #[error("frame error: {0}")]
    Frame(FrameError),

    /// Socket I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking handshake read did not complete in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// A session handler gave up on the session.
    #[error("session handler failed: {0}")]
    Handler(String),
}

impl From<FrameError> for SessionError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::InvalidMagic { found } => SessionError::Framing { found },
            FrameError::PartialFrame { expected, received } => {
                SessionError::PartialFrame { expected, received }
            }
            FrameError::ConnectionClosed => SessionError::Disconnected,
            FrameError::Io(err) => SessionError::Io(err),
            other => SessionError::Frame(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_errors_map_onto_session_taxonomy() {
        assert!(matches!(
            SessionError::from(FrameError::InvalidMagic { found: 0xAACC }),
            SessionError::Framing { found: 0xAACC }
        ));
        assert!(matches!(
            SessionError::from(FrameError::PartialFrame {
                expected: 8,
                received: 3
            }),
            SessionError::PartialFrame {
                expected: 8,
                received: 3
            }
        ));
        assert!(matches!(
            SessionError::from(FrameError::ConnectionClosed),
            SessionError::Disconnected
        ));
        assert!(matches!(
            SessionError::from(FrameError::PayloadTooLarge { size: 70000, max: 65535 }),
            SessionError::Frame(_)
        ));
    }

    #[test]
    fn framing_message_names_both_prefixes() {
        let err = SessionError::Framing { found: 0xAACC };
        assert_eq!(err.to_string(), "framing error: header prefix 0xAACC != 0xAABB");
    }
}
