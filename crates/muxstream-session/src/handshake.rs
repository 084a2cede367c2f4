use std::fmt;
use std::io::ErrorKind;
use std::time::Duration;

use muxstream_frame::{FrameWriter, MAX_PAYLOAD};
use muxstream_transport::Transport;
use tracing::{debug, info};

use crate::datagram::Datagram;
use crate::error::{Result, SessionError};

/// Protocol version byte this client speaks.
pub const PROTOCOL_VERSION: u8 = 0x01;

const MAX_TOKEN_LEN: usize = MAX_PAYLOAD - 1;

/// Connection lifecycle up to the start of the session loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Connected,
    VersionNegotiated,
    Authenticated,
}

/// Configuration for the opening exchange.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Version byte sent to, and expected back from, the node.
    pub protocol_version: u8,
    /// Upper bound on the wait for the version reply.
    pub timeout: Duration,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Result of a successful handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeResult {
    pub protocol_version: u8,
    pub state: HandshakeState,
}

/// Perform the client handshake with default configuration.
pub fn handshake_client<S: Transport>(stream: &mut S, token: &str) -> Result<HandshakeResult> {
    handshake_client_with_config(stream, token, &HandshakeConfig::default())
}

/// Send the version byte, check the node's reply, then authenticate.
///
/// The token is validated before anything is written so a bad token never
/// reaches the wire. The stream's read timeout is cleared on return.
pub fn handshake_client_with_config<S: Transport>(
    stream: &mut S,
    token: &str,
    config: &HandshakeConfig,
) -> Result<HandshakeResult> {
    validate_token(token)?;

    let version = negotiate_version(stream, config)?;
    debug!(version, state = ?HandshakeState::VersionNegotiated, "protocol version accepted");

    FrameWriter::new(&mut *stream).send(&Datagram::token_auth(token).encode())?;
    info!(
        version,
        token = %Redacted(token),
        "session authenticated"
    );

    Ok(HandshakeResult {
        protocol_version: version,
        state: HandshakeState::Authenticated,
    })
}

fn negotiate_version<S: Transport>(stream: &mut S, config: &HandshakeConfig) -> Result<u8> {
    stream.write_all(&[config.protocol_version])?;
    stream.flush()?;

    stream.set_read_timeout(Some(config.timeout))?;
    let reply = read_version_byte(stream, config.timeout);
    stream.set_read_timeout(None)?;

    match reply? {
        None => Err(SessionError::Handshake(
            "peer closed before answering the version byte".to_string(),
        )),
        Some(version) if version != config.protocol_version => {
            Err(SessionError::Handshake(format!(
                "unsupported protocol version {version:#04X} (expected {:#04X})",
                config.protocol_version
            )))
        }
        Some(version) => Ok(version),
    }
}

fn read_version_byte<S: Transport>(stream: &mut S, timeout: Duration) -> Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match stream.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                return Err(SessionError::Timeout(timeout))
            }
            Err(err) => return Err(SessionError::Io(err)),
        }
    }
}

fn validate_token(token: &str) -> Result<()> {
    if token.is_empty() {
        return Err(SessionError::Handshake("session token is empty".to_string()));
    }
    if token.len() > MAX_TOKEN_LEN {
        return Err(SessionError::Handshake(format!(
            "session token too long ({} bytes, max {MAX_TOKEN_LEN})",
            token.len()
        )));
    }
    if !token.is_ascii() || token.bytes().any(|b| b.is_ascii_control()) {
        return Err(SessionError::Handshake(
            "session token must be printable ASCII".to_string(),
        ));
    }
    Ok(())
}

/// Renders a credential as its length only.
pub(crate) struct Redacted<'a>(pub &'a str);

impl fmt::Display for Redacted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<redacted:{} bytes>", self.0.len())
    }
}

impl fmt::Debug for Redacted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
