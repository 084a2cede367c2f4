use std::fmt;
use std::time::{Duration, Instant};

use bytes::Bytes;
use muxstream_frame::{FrameConfig, FrameReader, FrameWriter};
use muxstream_transport::{SecurityMode, Transport};
use tracing::{debug, info, warn};

use crate::clock::now_millis;
use crate::datagram::{hex, Datagram};
use crate::error::{Result, SessionError};
use crate::handler::{DatagramSink, SessionHandler};
use crate::handshake::{handshake_client_with_config, HandshakeConfig, HandshakeState, Redacted};
use crate::shutdown::ShutdownSignal;

/// Session loop settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sleep after an iteration that found no datagram.
    pub poll_interval: Duration,
    pub handshake: HandshakeConfig,
    /// Bound on blocking body reads once the session is running.
    pub read_timeout: Option<Duration>,
    pub frame: FrameConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            handshake: HandshakeConfig::default(),
            read_timeout: None,
            frame: FrameConfig::default(),
        }
    }
}

/// How a session ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The node sent Bye.
    Bye { reason: Bytes },
    /// The shutdown signal was observed.
    Cancelled,
}

impl SessionEnd {
    /// Bye reason as text, if the node sent one.
    pub fn reason(&self) -> Option<String> {
        match self {
            SessionEnd::Bye { reason } => Some(String::from_utf8_lossy(reason).into_owned()),
            SessionEnd::Cancelled => None,
        }
    }
}

/// The single action taken for one received datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// Keepalive logged.
    Acknowledged,
    /// Payload handed to the handler.
    Delivered,
    /// TimestampResponse written.
    Responded,
    /// Logged and skipped (unknown tag, TokenAuth, TimestampResponse).
    Ignored,
    /// Bye received; the session is over.
    Closed { reason: Bytes },
}

/// Outcome of one loop iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// A frame was read and processed.
    Busy,
    /// Nothing was available; the loop slept for the poll interval.
    Idle,
    Finished(SessionEnd),
}

/// One authenticated connection to a streaming node.
///
/// Owns the stream exclusively and shuts it down when dropped.
pub struct Session<S: Transport> {
    reader: FrameReader<S>,
    config: SessionConfig,
    security: SecurityMode,
    token: String,
    protocol_version: u8,
    state: HandshakeState,
    last_idle: Option<Instant>,
    closed: bool,
}

impl<S: Transport> Session<S> {
    /// Run the handshake on a connected stream and return a ready session.
    ///
    /// On failure the stream is shut down before the error is returned.
    pub fn establish(
        stream: S,
        token: &str,
        security: SecurityMode,
        config: SessionConfig,
    ) -> Result<Self> {
        let mut session = Session {
            reader: FrameReader::with_config(stream, config.frame.clone()),
            protocol_version: config.handshake.protocol_version,
            config,
            security,
            token: token.to_string(),
            state: HandshakeState::Connected,
            last_idle: None,
            closed: false,
        };

        let handshake = &session.config.handshake;
        let result = handshake_client_with_config(session.reader.get_mut(), token, handshake)?;
        session.protocol_version = result.protocol_version;
        session.state = result.state;
        session.reader.get_ref().set_read_timeout(session.config.read_timeout)?;

        Ok(session)
    }

    /// Loop until Bye, cancellation, or an error. The stream is closed on
    /// every exit.
    pub fn run<H: SessionHandler + ?Sized>(
        &mut self,
        handler: &mut H,
        shutdown: &ShutdownSignal,
    ) -> Result<SessionEnd> {
        info!(
            security = %self.security,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "session loop started"
        );

        let outcome = loop {
            if shutdown.is_triggered() {
                break Ok(SessionEnd::Cancelled);
            }
            match self.step(handler) {
                Ok(Step::Finished(end)) => break Ok(end),
                Ok(Step::Busy | Step::Idle) => {}
                Err(err) => break Err(err),
            }
        };
        self.close();

        match &outcome {
            Ok(SessionEnd::Cancelled) => info!("session cancelled"),
            Ok(end @ SessionEnd::Bye { .. }) => {
                info!(reason = %end.reason().unwrap_or_default(), "session closed by node")
            }
            Err(err) => warn!(error = %err, "session failed"),
        }
        outcome
    }

    /// One iteration: poll, dispatch, `on_idle`, then sleep if idle.
    ///
    /// A Bye finishes the session before `on_idle` runs. An empty frame
    /// carries no datagram and counts as an idle iteration.
    pub fn step<H: SessionHandler + ?Sized>(&mut self, handler: &mut H) -> Result<Step> {
        if self.closed {
            return Err(SessionError::Disconnected);
        }

        let received = match self.reader.poll_frame()? {
            None => false,
            Some(payload) if payload.is_empty() => {
                debug!("empty frame skipped");
                false
            }
            Some(payload) => {
                let datagram = Datagram::decode(payload)?;
                if let Dispatched::Closed { reason } = self.dispatch(datagram, handler)? {
                    return Ok(Step::Finished(SessionEnd::Bye { reason }));
                }
                true
            }
        };

        handler.on_idle(self)?;
        self.last_idle = Some(Instant::now());

        if received {
            Ok(Step::Busy)
        } else {
            std::thread::sleep(self.config.poll_interval);
            Ok(Step::Idle)
        }
    }

    /// Perform the action for one datagram.
    pub fn dispatch<H: SessionHandler + ?Sized>(
        &mut self,
        datagram: Datagram,
        handler: &mut H,
    ) -> Result<Dispatched> {
        match datagram {
            Datagram::Keepalive => {
                debug!("keepalive received");
                Ok(Dispatched::Acknowledged)
            }
            Datagram::Bye { reason } => {
                info!(reason = %String::from_utf8_lossy(&reason), "bye received");
                Ok(Dispatched::Closed { reason })
            }
            Datagram::PayloadWithIdentifier(payload) => {
                debug!(
                    identifier = %payload.identifier,
                    payload_type = payload.payload_type,
                    origin_ms = payload.origin_timestamp,
                    size = payload.payload.len(),
                    "payload received"
                );
                handler.on_payload(&payload);
                Ok(Dispatched::Delivered)
            }
            Datagram::TimestampRequest { t0 } => {
                let t1 = now_millis();
                debug!(t0, t1, delta_ms = t1.saturating_sub(t0), "timestamp request");
                self.send_datagram(&Datagram::timestamp_response(t0, t1))?;
                Ok(Dispatched::Responded)
            }
            Datagram::TimestampResponse { t0, t1, t2 } => {
                debug!(t0, t1, t2, "timestamp response ignored");
                Ok(Dispatched::Ignored)
            }
            Datagram::TokenAuth { token } => {
                debug!(len = token.len(), "token datagram from node ignored");
                Ok(Dispatched::Ignored)
            }
            Datagram::Unknown { tag, body } => {
                warn!(
                    tag = %format!("{tag:#04X}"),
                    len = body.len(),
                    body = %hex(&body[..body.len().min(32)]),
                    "unknown datagram type ignored"
                );
                Ok(Dispatched::Ignored)
            }
        }
    }

    /// Shut the stream down. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = self.reader.get_mut().shutdown() {
            debug!(error = %err, "stream shutdown failed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn protocol_version(&self) -> u8 {
        self.protocol_version
    }

    pub fn security(&self) -> SecurityMode {
        self.security
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// When `on_idle` last ran.
    pub fn last_idle(&self) -> Option<Instant> {
        self.last_idle
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }
}

impl<S: Transport> DatagramSink for Session<S> {
    fn send_datagram(&mut self, datagram: &Datagram) -> Result<()> {
        if self.closed {
            return Err(SessionError::Disconnected);
        }
        debug!(kind = datagram.name(), "sending datagram");
        FrameWriter::with_config(self.reader.get_mut(), self.config.frame.clone())
            .send(&datagram.encode())?;
        Ok(())
    }
}

impl<S: Transport> Drop for Session<S> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<S: Transport> fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("security", &self.security)
            .field("token", &Redacted(&self.token))
            .field("protocol_version", &self.protocol_version)
            .field("state", &self.state)
            .field("closed", &self.closed)
            .finish()
    }
}
