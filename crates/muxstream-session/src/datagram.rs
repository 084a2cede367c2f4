use std::fmt;
use std::str::FromStr;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::clock::now_millis;

/// Keepalive; no body.
pub const KEEPALIVE: u8 = 0x00;
/// Token authentication; body is the session token.
pub const TOKEN_AUTH: u8 = 0x01;
/// Graceful close; body is a reason string.
pub const BYE: u8 = 0x02;
/// Identified payload: identifier(8) + type(1) + origin ms(8) + payload.
pub const PAYLOAD_WITH_IDENTIFIER: u8 = 0x05;
/// Clock-sync probe: t0(8).
pub const TIMESTAMP_REQUEST: u8 = 0x06;
/// Clock-sync answer: t0(8) + t1(8) + t2(8).
pub const TIMESTAMP_RESPONSE: u8 = 0x07;

/// Width of a stream identifier on the wire.
pub const IDENTIFIER_LEN: usize = 8;

const PAYLOAD_HEADER_LEN: usize = IDENTIFIER_LEN + 1 + 8;

/// Errors produced while decoding or building datagrams.
#[derive(Debug, thiserror::Error)]
pub enum DatagramError {
    /// Body shorter than the fixed layout of its type.
    #[error("datagram type {tag:#04X} needs {expected} body bytes, got {actual}")]
    Truncated {
        tag: u8,
        expected: usize,
        actual: usize,
    },

    /// Identifier is not exactly 8 ASCII bytes.
    #[error("invalid identifier {0:?}: expected {IDENTIFIER_LEN} ASCII characters")]
    InvalidIdentifier(String),
}

/// Eight-character ASCII stream identifier, e.g. `sub00001`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identifier([u8; IDENTIFIER_LEN]);

impl Identifier {
    /// Validate and wrap an identifier string.
    pub fn new(value: &str) -> Result<Self, DatagramError> {
        Self::from_bytes(value.as_bytes())
    }

    fn from_bytes(raw: &[u8]) -> Result<Self, DatagramError> {
        if raw.len() != IDENTIFIER_LEN || !raw.is_ascii() {
            return Err(DatagramError::InvalidIdentifier(
                String::from_utf8_lossy(raw).into_owned(),
            ));
        }
        let mut id = [0u8; IDENTIFIER_LEN];
        id.copy_from_slice(raw);
        Ok(Self(id))
    }

    pub fn as_bytes(&self) -> &[u8; IDENTIFIER_LEN] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // ASCII is checked on construction.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl FromStr for Identifier {
    type Err = DatagramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({:?})", self.as_str())
    }
}

/// Body of a `PayloadWithIdentifier` datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifiedPayload {
    pub identifier: Identifier,
    /// Application-defined payload type.
    pub payload_type: u8,
    /// Sender wall clock (ms since epoch) when the payload was built.
    pub origin_timestamp: u64,
    pub payload: Bytes,
}

/// One protocol message: the first payload byte of a frame selects the type.
#[derive(Clone, PartialEq, Eq)]
pub enum Datagram {
    Keepalive,
    TokenAuth { token: Bytes },
    Bye { reason: Bytes },
    PayloadWithIdentifier(IdentifiedPayload),
    TimestampRequest { t0: u64 },
    TimestampResponse { t0: u64, t1: u64, t2: u64 },
    /// A type byte this client does not know. Carried so it can be logged.
    Unknown { tag: u8, body: Bytes },
}

impl Datagram {
    pub fn keepalive() -> Self {
        Datagram::Keepalive
    }

    pub fn token_auth(token: &str) -> Self {
        Datagram::TokenAuth {
            token: Bytes::copy_from_slice(token.as_bytes()),
        }
    }

    pub fn bye(reason: &str) -> Self {
        Datagram::Bye {
            reason: Bytes::copy_from_slice(reason.as_bytes()),
        }
    }

    /// Identified payload stamped with the current wall clock.
    pub fn payload_with_identifier(
        identifier: Identifier,
        payload_type: u8,
        payload: impl Into<Bytes>,
    ) -> Self {
        Datagram::PayloadWithIdentifier(IdentifiedPayload {
            identifier,
            payload_type,
            origin_timestamp: now_millis(),
            payload: payload.into(),
        })
    }

    pub fn timestamp_request(t0: u64) -> Self {
        Datagram::TimestampRequest { t0 }
    }

    /// Answer to a probe received at `t1`; `t2` is stamped now.
    pub fn timestamp_response(t0: u64, t1: u64) -> Self {
        Datagram::TimestampResponse {
            t0,
            t1,
            t2: now_millis().max(t1),
        }
    }

    /// Wire type byte.
    pub fn tag(&self) -> u8 {
        match self {
            Datagram::Keepalive => KEEPALIVE,
            Datagram::TokenAuth { .. } => TOKEN_AUTH,
            Datagram::Bye { .. } => BYE,
            Datagram::PayloadWithIdentifier(_) => PAYLOAD_WITH_IDENTIFIER,
            Datagram::TimestampRequest { .. } => TIMESTAMP_REQUEST,
            Datagram::TimestampResponse { .. } => TIMESTAMP_RESPONSE,
            Datagram::Unknown { tag, .. } => *tag,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Datagram::Keepalive => "keepalive",
            Datagram::TokenAuth { .. } => "token_auth",
            Datagram::Bye { .. } => "bye",
            Datagram::PayloadWithIdentifier(_) => "payload_with_identifier",
            Datagram::TimestampRequest { .. } => "timestamp_request",
            Datagram::TimestampResponse { .. } => "timestamp_response",
            Datagram::Unknown { .. } => "unknown",
        }
    }

    /// Serialize to a frame payload (type byte first, integers big-endian).
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u8(self.tag());
        match self {
            Datagram::Keepalive => {}
            Datagram::TokenAuth { token } => buf.put_slice(token),
            Datagram::Bye { reason } => buf.put_slice(reason),
            Datagram::PayloadWithIdentifier(p) => {
                buf.reserve(PAYLOAD_HEADER_LEN + p.payload.len());
                buf.put_slice(p.identifier.as_bytes());
                buf.put_u8(p.payload_type);
                buf.put_u64(p.origin_timestamp);
                buf.put_slice(&p.payload);
            }
            Datagram::TimestampRequest { t0 } => buf.put_u64(*t0),
            Datagram::TimestampResponse { t0, t1, t2 } => {
                buf.put_u64(*t0);
                buf.put_u64(*t1);
                buf.put_u64(*t2);
            }
            Datagram::Unknown { body, .. } => buf.put_slice(body),
        }
        buf.freeze()
    }

    /// Parse a non-empty frame payload.
    ///
    /// Unknown type bytes decode to [`Datagram::Unknown`]; bodies shorter
    /// than their type's fixed layout fail with
    /// [`DatagramError::Truncated`]. Trailing bytes after a fixed layout are
    /// ignored.
    pub fn decode(mut raw: Bytes) -> Result<Self, DatagramError> {
        if raw.is_empty() {
            return Err(DatagramError::Truncated {
                tag: 0,
                expected: 1,
                actual: 0,
            });
        }
        let tag = raw.get_u8();
        let body = raw;

        match tag {
            KEEPALIVE => Ok(Datagram::Keepalive),
            TOKEN_AUTH => Ok(Datagram::TokenAuth { token: body }),
            BYE => Ok(Datagram::Bye { reason: body }),
            PAYLOAD_WITH_IDENTIFIER => {
                require_len(tag, &body, PAYLOAD_HEADER_LEN)?;
                let identifier = Identifier::from_bytes(&body[..IDENTIFIER_LEN])?;
                let mut rest = body.slice(IDENTIFIER_LEN..);
                let payload_type = rest.get_u8();
                let origin_timestamp = rest.get_u64();
                Ok(Datagram::PayloadWithIdentifier(IdentifiedPayload {
                    identifier,
                    payload_type,
                    origin_timestamp,
                    payload: rest,
                }))
            }
            TIMESTAMP_REQUEST => {
                require_len(tag, &body, 8)?;
                let mut body = body;
                Ok(Datagram::TimestampRequest { t0: body.get_u64() })
            }
            TIMESTAMP_RESPONSE => {
                require_len(tag, &body, 24)?;
                let mut body = body;
                Ok(Datagram::TimestampResponse {
                    t0: body.get_u64(),
                    t1: body.get_u64(),
                    t2: body.get_u64(),
                })
            }
            _ => Ok(Datagram::Unknown { tag, body }),
        }
    }
}

fn require_len(tag: u8, body: &Bytes, expected: usize) -> Result<(), DatagramError> {
    if body.len() < expected {
        return Err(DatagramError::Truncated {
            tag,
            expected,
            actual: body.len(),
        });
    }
    Ok(())
}

impl fmt::Debug for Datagram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datagram::Keepalive => f.write_str("Keepalive"),
            Datagram::TokenAuth { token } => f
                .debug_struct("TokenAuth")
                .field("token", &format_args!("<redacted:{} bytes>", token.len()))
                .finish(),
            Datagram::Bye { reason } => f
                .debug_struct("Bye")
                .field("reason", &String::from_utf8_lossy(reason))
                .finish(),
            Datagram::PayloadWithIdentifier(p) => {
                f.debug_tuple("PayloadWithIdentifier").field(p).finish()
            }
            Datagram::TimestampRequest { t0 } => {
                f.debug_struct("TimestampRequest").field("t0", t0).finish()
            }
            Datagram::TimestampResponse { t0, t1, t2 } => f
                .debug_struct("TimestampResponse")
                .field("t0", t0)
                .field("t1", t1)
                .field("t2", t2)
                .finish(),
            Datagram::Unknown { tag, body } => f
                .debug_struct("Unknown")
                .field("tag", &format_args!("{tag:#04X}"))
                .field("len", &body.len())
                .finish(),
        }
    }
}

/// Lower-case hex rendering for diagnostics.
pub(crate) fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
