//! Session bootstrap over the streaming REST API.
//!
//! `POST {base}/v1/sessions` exchanges a long-lived auth token for a
//! listener address and a one-shot session token.

mod api;
mod error;

pub use api::{
    create_session, create_session_with, session_request, BootstrapConfig, ListenerDetails,
    ResponseDetails, Role, SessionDetails, SessionGrant, SessionRequest, SessionResponse,
    PROTOCOL,
};
pub use error::{BootstrapError, Result};
