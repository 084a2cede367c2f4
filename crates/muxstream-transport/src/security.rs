use std::fmt;
use std::str::FromStr;

/// Wire label for plaintext sessions.
pub const SECURITY_MODE_NONE: &str = "NONE";
/// Wire label for TLS sessions.
pub const SECURITY_MODE_TLS: &str = "TLSv1.2";

/// Transport security requested for a session.
///
/// The string forms are the labels the session bootstrap API uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityMode {
    /// Plain TCP.
    None,
    /// TLS with server-name verification.
    #[default]
    Tls,
}

impl SecurityMode {
    /// The bootstrap API label for this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            SecurityMode::None => SECURITY_MODE_NONE,
            SecurityMode::Tls => SECURITY_MODE_TLS,
        }
    }

    /// Whether the stream must be wrapped in TLS.
    pub fn uses_tls(self) -> bool {
        matches!(self, SecurityMode::Tls)
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a security mode label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown security mode '{0}' (expected '{SECURITY_MODE_NONE}' or '{SECURITY_MODE_TLS}')")]
pub struct ParseSecurityModeError(pub String);

impl FromStr for SecurityMode {
    type Err = ParseSecurityModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case(SECURITY_MODE_NONE) {
            Ok(SecurityMode::None)
        } else if trimmed.eq_ignore_ascii_case(SECURITY_MODE_TLS) {
            Ok(SecurityMode::Tls)
        } else {
            Err(ParseSecurityModeError(s.to_string()))
        }
    }
}
