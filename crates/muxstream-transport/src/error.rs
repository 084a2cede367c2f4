/// Errors that can occur while establishing or driving a stream transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the TCP connection.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// The host cannot be used as a TLS server name.
    #[error("invalid TLS server name '{0}'")]
    InvalidServerName(String),

    /// Failed to load the configured CA bundle.
    #[error("failed to load CA bundle {path}: {source}")]
    CaBundle {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    /// The TLS layer rejected the configuration or the handshake.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
