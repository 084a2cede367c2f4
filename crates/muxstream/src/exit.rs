use std::fmt;
use std::io;

use muxstream_bootstrap::BootstrapError;
use muxstream_frame::FrameError;
use muxstream_session::SessionError;
use muxstream_transport::TransportError;

// Exit code constants aligned with rsfulmen/DDR-0002 semantics.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { source, addr } => {
            io_error(&format!("{context} ({addr})"), source)
        }
        TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidServerName(_) | TransportError::CaBundle { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::Frame(err) => frame_error(context, err),
        SessionError::Io(source) => io_error(context, source),
        SessionError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        SessionError::Framing { .. }
        | SessionError::PartialFrame { .. }
        | SessionError::Protocol(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        SessionError::Handshake(_) | SessionError::Disconnected => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        SessionError::Handler(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

pub fn bootstrap_error(context: &str, err: BootstrapError) -> CliError {
    let code = match &err {
        BootstrapError::Config(_) => USAGE,
        BootstrapError::Http(err) if err.is_timeout() => TIMEOUT,
        BootstrapError::Http(err) if err.is_connect() => TRANSPORT_ERROR,
        BootstrapError::Http(_) => FAILURE,
        BootstrapError::Status { status: 401 | 403, .. } => PERMISSION_DENIED,
        BootstrapError::Status { .. } => FAILURE,
        BootstrapError::Json(_) => DATA_INVALID,
    };
    CliError::new(code, format!("{context}: {err}"))
}
