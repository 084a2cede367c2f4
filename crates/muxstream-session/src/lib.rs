//! Protocol engine for muxstream sessions.
//!
//! A session is one authenticated TCP (optionally TLS) connection. After the
//! version byte exchange and the token datagram, [`Session::run`] polls for
//! datagrams, dispatches them, and hands control to a [`SessionHandler`]
//! once per iteration so role drivers can schedule their own writes.

pub mod clock;
pub mod connector;
pub mod datagram;
pub mod driver;
pub mod error;
pub mod handler;
pub mod handshake;
pub mod session;
pub mod shutdown;

#[cfg(test)]
mod testing;

pub use connector::{connect, ConnectOptions};
pub use datagram::{
    Datagram, DatagramError, IdentifiedPayload, Identifier, BYE, IDENTIFIER_LEN, KEEPALIVE,
    PAYLOAD_WITH_IDENTIFIER, TIMESTAMP_REQUEST, TIMESTAMP_RESPONSE, TOKEN_AUTH,
};
pub use driver::{Consumer, PayloadReport, Producer, PRODUCER_PAYLOAD_TYPE};
pub use error::{Result, SessionError};
pub use handler::{callbacks, Callbacks, DatagramSink, SessionHandler};
pub use handshake::{
    handshake_client, handshake_client_with_config, HandshakeConfig, HandshakeResult,
    HandshakeState, PROTOCOL_VERSION,
};
pub use session::{Dispatched, Session, SessionConfig, SessionEnd, Step};
pub use shutdown::ShutdownSignal;
