//! Client for length-prefixed, multiplexed TCP streaming sessions.
//!
//! A client asks the REST API for a session, connects to the returned
//! listener (plain TCP or TLS), exchanges a version byte, authenticates with
//! the session token, and then trades framed datagrams with the node.
//!
//! # Crate Structure
//!
//! - [`transport`] — TCP/TLS connection setup and the `Transport` seam
//! - [`frame`] — `0xAA 0xBB` + u16 length framing
//! - [`session`] — datagrams, handshake, session loop and role drivers
//! - [`bootstrap`] — REST session bootstrap (behind `bootstrap` feature)

/// Re-export transport types.
pub mod transport {
    pub use muxstream_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use muxstream_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use muxstream_session::*;
}

/// Re-export bootstrap types (requires `bootstrap` feature).
#[cfg(feature = "bootstrap")]
pub mod bootstrap {
    pub use muxstream_bootstrap::*;
}
