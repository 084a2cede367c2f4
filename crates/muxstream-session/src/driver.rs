//! Producer and consumer roles as [`SessionHandler`]s.

use std::fmt;
use std::time::{Duration, Instant};

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, info};

use crate::clock::now_millis;
use crate::datagram::{IdentifiedPayload, Identifier};
use crate::error::Result;
use crate::handler::{DatagramSink, SessionHandler};

/// Payload type stamped on producer datagrams.
pub const PRODUCER_PAYLOAD_TYPE: u8 = 0x02;

/// Writes a random payload on a fixed cadence.
pub struct Producer {
    identifier: Identifier,
    payload_type: u8,
    payload_size: usize,
    interval: Duration,
    last_write: Instant,
    sent: u64,
    rng: StdRng,
}

impl Producer {
    /// 100 random bytes of type `0x02` every second.
    pub fn new(identifier: Identifier) -> Self {
        Self {
            identifier,
            payload_type: PRODUCER_PAYLOAD_TYPE,
            payload_size: 100,
            interval: Duration::from_secs(1),
            last_write: Instant::now(),
            sent: 0,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_payload_size(mut self, payload_size: usize) -> Self {
        self.payload_size = payload_size;
        self
    }

    pub fn with_payload_type(mut self, payload_type: u8) -> Self {
        self.payload_type = payload_type;
        self
    }

    /// Payloads written so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl SessionHandler for Producer {
    fn on_payload(&mut self, payload: &IdentifiedPayload) {
        info!(
            identifier = %payload.identifier,
            payload_type = payload.payload_type,
            origin_ms = payload.origin_timestamp,
            size = payload.payload.len(),
            "producer received payload"
        );
    }

    fn on_idle(&mut self, sink: &mut dyn DatagramSink) -> Result<()> {
        if self.last_write.elapsed() < self.interval {
            return Ok(());
        }
        self.last_write = Instant::now();

        let mut body = vec![0u8; self.payload_size];
        self.rng.fill_bytes(&mut body);
        sink.send_payload(self.identifier, self.payload_type, Bytes::from(body))?;
        self.sent += 1;
        debug!(
            identifier = %self.identifier,
            size = self.payload_size,
            sent = self.sent,
            "payload written"
        );
        Ok(())
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("identifier", &self.identifier)
            .field("payload_type", &self.payload_type)
            .field("payload_size", &self.payload_size)
            .field("interval", &self.interval)
            .field("sent", &self.sent)
            .finish()
    }
}

/// What a consumer observed for one received payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadReport {
    pub identifier: Identifier,
    pub payload_type: u8,
    pub origin_timestamp: u64,
    /// Receive time minus origin, saturating at 0 under clock skew.
    pub latency_ms: u64,
    pub payload: Bytes,
}

type Observer = Box<dyn FnMut(&PayloadReport) + Send>;

/// Keeps the session alive and reports received payloads with latency.
pub struct Consumer {
    keepalive_interval: Duration,
    last_write: Instant,
    received: u64,
    observer: Option<Observer>,
}

impl Consumer {
    /// Keepalive every 5 seconds, no observer.
    pub fn new() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(5),
            last_write: Instant::now(),
            received: 0,
            observer: None,
        }
    }

    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Receive a [`PayloadReport`] for every payload.
    pub fn with_observer(mut self, observer: impl FnMut(&PayloadReport) + Send + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Payloads received so far.
    pub fn received(&self) -> u64 {
        self.received
    }
}

impl Default for Consumer {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandler for Consumer {
    fn on_payload(&mut self, payload: &IdentifiedPayload) {
        let latency_ms = now_millis().saturating_sub(payload.origin_timestamp);
        self.received += 1;
        info!(
            identifier = %payload.identifier,
            payload_type = payload.payload_type,
            origin_ms = payload.origin_timestamp,
            latency_ms,
            size = payload.payload.len(),
            "consumer received payload"
        );

        if let Some(observer) = self.observer.as_mut() {
            observer(&PayloadReport {
                identifier: payload.identifier,
                payload_type: payload.payload_type,
                origin_timestamp: payload.origin_timestamp,
                latency_ms,
                payload: payload.payload.clone(),
            });
        }
    }

    fn on_idle(&mut self, sink: &mut dyn DatagramSink) -> Result<()> {
        if self.last_write.elapsed() < self.keepalive_interval {
            return Ok(());
        }
        self.last_write = Instant::now();
        sink.send_keepalive()?;
        debug!("keepalive written");
        Ok(())
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("keepalive_interval", &self.keepalive_interval)
            .field("received", &self.received)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}
