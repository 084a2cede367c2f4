use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: magic (2) + length (2) = 4 bytes.
pub const HEADER_SIZE: usize = 4;

/// Magic prefix that opens every frame.
pub const MAGIC: [u8; 2] = [0xAA, 0xBB];

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// A parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Whether the first two bytes matched [`MAGIC`].
    pub prefix_ok: bool,
    /// Declared payload length.
    pub length: u16,
    /// The raw prefix bytes, for diagnostics.
    pub prefix: [u8; 2],
}

impl FrameHeader {
    /// Fail with [`FrameError::InvalidMagic`] unless the prefix matched.
    pub fn validate(self) -> Result<usize> {
        if !self.prefix_ok {
            return Err(FrameError::InvalidMagic {
                found: u16::from_be_bytes(self.prefix),
            });
        }
        Ok(self.length as usize)
    }
}

/// Parse a frame header. Pure; performs no I/O.
pub fn decode_header(header: &[u8; HEADER_SIZE]) -> FrameHeader {
    let prefix = [header[0], header[1]];
    FrameHeader {
        prefix_ok: prefix == MAGIC,
        length: u16::from_be_bytes([header[2], header[3]]),
        prefix,
    }
}

/// Configuration for frame reading and writing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default and ceiling: [`MAX_PAYLOAD`].
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD,
        }
    }
}

/// Encode a payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬───────────┬─────────────────┐
/// │ Magic (2B)   │ Length    │ Payload         │
/// │ 0xAA 0xBB    │ (2B BE)   │ (Length bytes)  │
/// └──────────────┴───────────┴─────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&MAGIC);
    dst.put_u16(payload.len() as u16);
    dst.put_slice(payload);
    Ok(())
}

/// Encode a payload into a freshly allocated frame.
pub fn encode(payload: &[u8]) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    encode_frame(payload, &mut buf)?;
    Ok(buf.freeze())
}

/// Decode one frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer and returns the
/// payload.
pub fn decode_frame(src: &mut BytesMut) -> Result<Option<Bytes>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let mut header = [0u8; HEADER_SIZE];
    header.copy_from_slice(&src[..HEADER_SIZE]);
    let payload_len = decode_header(&header).validate()?;

    if src.len() < HEADER_SIZE + payload_len {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    Ok(Some(src.split_to(payload_len).freeze()))
}
