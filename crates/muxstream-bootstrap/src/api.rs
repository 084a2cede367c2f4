use std::fmt;
use std::time::Duration;

use muxstream_transport::SecurityMode;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{BootstrapError, Result};

/// Protocol name requested for every session.
pub const PROTOCOL: &str = "TCPStreaming_Multiplex";

const AUTH_HEADER: &str = "X-Authorization";
const MAX_REASON_LEN: usize = 256;

/// Which side of the stream a session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Producer side.
    #[serde(rename = "TLC")]
    Tlc,
    /// Consumer side.
    #[serde(rename = "Broker")]
    Broker,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Tlc => "TLC",
            Role::Broker => "Broker",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings shared by every bootstrap call.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// API base URL without the `/v1/sessions` suffix.
    pub base_url: String,
    pub domain: String,
    pub security: SecurityMode,
    /// Stream identifier requested for the session.
    pub identifier: String,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost/api".to_string(),
            domain: "dev_001".to_string(),
            security: SecurityMode::Tls,
            identifier: "sub00001".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl BootstrapConfig {
    /// Full endpoint URL.
    pub fn sessions_url(&self) -> String {
        format!("{}/v1/sessions", self.base_url.trim_end_matches('/'))
    }
}

/// Request body for `POST /v1/sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub domain: String,
    #[serde(rename = "type")]
    pub role: Role,
    pub protocol: String,
    pub details: SessionDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetails {
    pub security_mode: String,
    pub tlc_identifiers: Vec<String>,
}

/// Success body of `POST /v1/sessions`. Unknown fields are ignored.
#[derive(Clone, Deserialize)]
pub struct SessionResponse {
    pub token: String,
    pub details: ResponseDetails,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseDetails {
    pub listener: ListenerDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListenerDetails {
    pub host: String,
    pub port: u16,
}

/// Where to connect and what token to present there.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionGrant {
    pub host: String,
    pub port: u16,
    /// One-shot session token for the TokenAuth datagram.
    pub token: String,
}

impl From<SessionResponse> for SessionGrant {
    fn from(response: SessionResponse) -> Self {
        Self {
            host: response.details.listener.host,
            port: response.details.listener.port,
            token: response.token,
        }
    }
}

impl fmt::Debug for SessionGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGrant")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("token", &format_args!("<redacted:{} bytes>", self.token.len()))
            .finish()
    }
}

impl fmt::Debug for SessionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionResponse")
            .field("token", &format_args!("<redacted:{} bytes>", self.token.len()))
            .field("details", &self.details)
            .finish()
    }
}

/// Build the request body for `role`.
pub fn session_request(role: Role, config: &BootstrapConfig) -> SessionRequest {
    SessionRequest {
        domain: config.domain.clone(),
        role,
        protocol: PROTOCOL.to_string(),
        details: SessionDetails {
            security_mode: config.security.as_str().to_string(),
            tlc_identifiers: vec![config.identifier.clone()],
        },
    }
}

/// Request a streaming session with a fresh blocking client.
pub fn create_session(
    role: Role,
    auth_token: &str,
    config: &BootstrapConfig,
) -> Result<SessionGrant> {
    let client = Client::builder().timeout(config.timeout).build()?;
    create_session_with(&client, role, auth_token, config)
}

/// Request a streaming session using an existing client.
pub fn create_session_with(
    client: &Client,
    role: Role,
    auth_token: &str,
    config: &BootstrapConfig,
) -> Result<SessionGrant> {
    if auth_token.trim().is_empty() {
        return Err(BootstrapError::Config(format!(
            "missing API auth token for role {role}"
        )));
    }

    let url = config.sessions_url();
    let body = session_request(role, config);
    debug!(%url, %role, domain = %body.domain, "requesting session");

    let response = client
        .post(&url)
        .header(AUTH_HEADER, auth_token)
        .header(CONTENT_TYPE, "application/json")
        .json(&body)
        .send()?;

    let status = response.status();
    let text = response.text()?;
    if !status.is_success() {
        let reason = match text.trim() {
            "" => status.canonical_reason().unwrap_or("unknown").to_string(),
            body => body.chars().take(MAX_REASON_LEN).collect(),
        };
        return Err(BootstrapError::Status {
            status: status.as_u16(),
            reason,
        });
    }

    let parsed: SessionResponse = serde_json::from_str(&text)?;
    let grant = SessionGrant::from(parsed);
    info!(
        %role,
        host = %grant.host,
        port = grant.port,
        "session created"
    );
    Ok(grant)
}
