//! Length-prefixed framing for the muxstream wire protocol.
//!
//! Every datagram travels in exactly one frame:
//! - A 2-byte magic prefix (`0xAA 0xBB`)
//! - A 2-byte big-endian payload length
//! - The payload itself
//!
//! A bad prefix is fatal. There is no resynchronization: once the stream is
//! out of step the session has to be torn down.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, decode_header, encode, encode_frame, FrameConfig, FrameHeader, HEADER_SIZE,
    MAGIC, MAX_PAYLOAD,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
