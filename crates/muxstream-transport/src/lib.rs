//! TCP transport with optional TLS for muxstream sessions.
//!
//! This is the lowest layer of muxstream. It opens the socket, wraps it in
//! rustls when the session's security mode asks for it, and exposes the
//! result as a [`StreamConnection`]. Everything above talks to the socket
//! through the [`Transport`] trait, which makes the blocking/non-blocking
//! switches explicit.

pub mod error;
pub mod security;
pub mod tcp;
pub mod tls;
pub mod traits;

pub use error::{Result, TransportError};
pub use security::{ParseSecurityModeError, SecurityMode};
pub use tcp::connect;
pub use tls::{build_client_config, TlsOptions};
pub use traits::{StreamConnection, Transport};
