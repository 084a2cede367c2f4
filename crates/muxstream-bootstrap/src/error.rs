/// Errors from the session bootstrap call.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// The request could not be built from the given settings.
    #[error("invalid bootstrap configuration: {0}")]
    Config(String),

    /// Connection, TLS, or timeout failure talking to the API.
    #[error("session request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("session request rejected: HTTP {status} {reason}")]
    Status { status: u16, reason: String },

    /// The success body did not match the expected shape.
    #[error("invalid session response: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BootstrapError>;
