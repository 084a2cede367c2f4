use std::io::{ErrorKind, Read};

use bytes::Bytes;
use muxstream_transport::Transport;
use tracing::{debug, trace};

use crate::codec::{decode_header, FrameConfig, HEADER_SIZE};
use crate::error::{FrameError, Result};

/// Reads complete frames from a [`Transport`].
///
/// No partial-frame state survives between calls: a call either returns a
/// whole payload, returns nothing, or fails.
pub struct FrameReader<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: Transport> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Try to read the next frame without waiting for one to arrive.
    ///
    /// The header read is attempted in non-blocking mode; `Ok(None)` means no
    /// data was available. Once header bytes arrive the stream is switched
    /// back to blocking mode and the rest of the frame is read to completion.
    /// The stream is always left in blocking mode.
    pub fn poll_frame(&mut self) -> Result<Option<Bytes>> {
        let mut header = [0u8; HEADER_SIZE];

        self.inner.set_nonblocking(true)?;
        let first = read_retrying(&mut self.inner, &mut header);
        self.inner.set_nonblocking(false)?;

        let received = match first {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(None),
            Err(err) => return Err(FrameError::Io(err)),
        };

        if received < HEADER_SIZE {
            trace!(received, "header split across reads; completing in blocking mode");
            fill(&mut self.inner, &mut header, received)?;
        }

        self.read_body(&header).map(Some)
    }

    /// Read the next frame, blocking until it arrives.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached between
    /// frames.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        let mut header = [0u8; HEADER_SIZE];
        let received = read_retrying(&mut self.inner, &mut header)?;
        if received == 0 {
            return Err(FrameError::ConnectionClosed);
        }
        fill(&mut self.inner, &mut header, received)?;
        self.read_body(&header)
    }

    fn read_body(&mut self, header: &[u8; HEADER_SIZE]) -> Result<Bytes> {
        let length = decode_header(header).validate()?;
        if length > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: length,
                max: self.config.max_payload_size,
            });
        }

        let mut payload = vec![0u8; length];
        fill(&mut self.inner, &mut payload, 0)?;
        debug!(length, "received frame");

        Ok(Bytes::from(payload))
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

fn read_retrying<R: Read>(inner: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    loop {
        match inner.read(buf) {
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Fill `buf[filled..]` in blocking mode. EOF before the end is a partial frame.
fn fill<R: Read>(inner: &mut R, buf: &mut [u8], mut filled: usize) -> Result<()> {
    while filled < buf.len() {
        match read_retrying(inner, &mut buf[filled..]) {
            Ok(0) => {
                return Err(FrameError::PartialFrame {
                    expected: buf.len(),
                    received: filled,
                })
            }
            Ok(n) => filled += n,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(())
}
