use bytes::Bytes;

use crate::datagram::{Datagram, IdentifiedPayload, Identifier};
use crate::error::Result;

/// Outbound half of a session, lent to handlers during `on_idle`.
pub trait DatagramSink {
    /// Frame and send one datagram (blocking full send).
    fn send_datagram(&mut self, datagram: &Datagram) -> Result<()>;

    fn send_keepalive(&mut self) -> Result<()> {
        self.send_datagram(&Datagram::keepalive())
    }

    /// Send an identified payload stamped with the current wall clock.
    fn send_payload(
        &mut self,
        identifier: Identifier,
        payload_type: u8,
        payload: Bytes,
    ) -> Result<()> {
        self.send_datagram(&Datagram::payload_with_identifier(
            identifier,
            payload_type,
            payload,
        ))
    }

    fn send_bye(&mut self, reason: &str) -> Result<()> {
        self.send_datagram(&Datagram::bye(reason))
    }
}

/// Role-specific behavior plugged into the session loop.
pub trait SessionHandler {
    /// Called for every `PayloadWithIdentifier` datagram.
    fn on_payload(&mut self, payload: &IdentifiedPayload);

    /// Called exactly once per loop iteration, after any dispatch.
    ///
    /// An error ends the session.
    fn on_idle(&mut self, sink: &mut dyn DatagramSink) -> Result<()>;
}

impl<H: SessionHandler + ?Sized> SessionHandler for &mut H {
    fn on_payload(&mut self, payload: &IdentifiedPayload) {
        (**self).on_payload(payload)
    }

    fn on_idle(&mut self, sink: &mut dyn DatagramSink) -> Result<()> {
        (**self).on_idle(sink)
    }
}

impl<H: SessionHandler + ?Sized> SessionHandler for Box<H> {
    fn on_payload(&mut self, payload: &IdentifiedPayload) {
        (**self).on_payload(payload)
    }

    fn on_idle(&mut self, sink: &mut dyn DatagramSink) -> Result<()> {
        (**self).on_idle(sink)
    }
}

/// Closure pair adapted to [`SessionHandler`]. Built with [`callbacks`].
pub struct Callbacks<P, I> {
    on_payload: P,
    on_idle: I,
}

/// Build a handler from an `on_payload` and an `on_idle` closure.
pub fn callbacks<P, I>(on_payload: P, on_idle: I) -> Callbacks<P, I>
where
    P: FnMut(&IdentifiedPayload),
    I: FnMut(&mut dyn DatagramSink) -> Result<()>,
{
    Callbacks {
        on_payload,
        on_idle,
    }
}

impl<P, I> SessionHandler for Callbacks<P, I>
where
    P: FnMut(&IdentifiedPayload),
    I: FnMut(&mut dyn DatagramSink) -> Result<()>,
{
    fn on_payload(&mut self, payload: &IdentifiedPayload) {
        (self.on_payload)(payload)
    }

    fn on_idle(&mut self, sink: &mut dyn DatagramSink) -> Result<()> {
        (self.on_idle)(sink)
    }
}
