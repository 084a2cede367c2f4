use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use rustls::{ClientConnection, StreamOwned};
use tracing::debug;

/// A connected byte stream whose blocking mode the session loop controls.
///
/// Reads and writes go through `Read`/`Write`; the session flips the socket
/// into non-blocking mode only for the header poll and back afterwards.
pub trait Transport: Read + Write {
    /// Switch the underlying socket between blocking and non-blocking reads.
    fn set_nonblocking(&self, nonblocking: bool) -> std::io::Result<()>;

    /// Bound blocking reads. `None` blocks indefinitely.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()>;

    /// Close the stream. Further reads and writes fail.
    fn shutdown(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Transport for TcpStream {
    fn set_nonblocking(&self, nonblocking: bool) -> std::io::Result<()> {
        TcpStream::set_nonblocking(self, nonblocking)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn shutdown(&mut self) -> std::io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn set_nonblocking(&self, nonblocking: bool) -> std::io::Result<()> {
        (**self).set_nonblocking(nonblocking)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        (**self).set_read_timeout(timeout)
    }

    fn shutdown(&mut self) -> std::io::Result<()> {
        (**self).shutdown()
    }
}

/// A connected session stream, plaintext or TLS.
pub struct StreamConnection {
    inner: StreamInner,
}

enum StreamInner {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl StreamConnection {
    pub(crate) fn plain(stream: TcpStream) -> Self {
        Self {
            inner: StreamInner::Plain(stream),
        }
    }

    pub(crate) fn tls(stream: StreamOwned<ClientConnection, TcpStream>) -> Self {
        Self {
            inner: StreamInner::Tls(Box::new(stream)),
        }
    }

    /// Whether the stream is wrapped in TLS.
    pub fn is_tls(&self) -> bool {
        matches!(self.inner, StreamInner::Tls(_))
    }

    /// Address of the remote peer.
    pub fn peer_addr(&self) -> std::io::Result<SocketAddr> {
        self.tcp().peer_addr()
    }

    fn tcp(&self) -> &TcpStream {
        match &self.inner {
            StreamInner::Plain(stream) => stream,
            StreamInner::Tls(stream) => stream.get_ref(),
        }
    }
}

impl Read for StreamConnection {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            StreamInner::Plain(stream) => stream.read(buf),
            // A TCP close without close_notify reads as EOF, like a plain close.
            StreamInner::Tls(stream) => match stream.read(buf) {
                Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                    debug!("peer closed TLS stream without close_notify");
                    Ok(0)
                }
                other => other,
            },
        }
    }
}

impl Write for StreamConnection {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            StreamInner::Plain(stream) => stream.write(buf),
            StreamInner::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            StreamInner::Plain(stream) => stream.flush(),
            StreamInner::Tls(stream) => stream.flush(),
        }
    }
}

impl Transport for StreamConnection {
    fn set_nonblocking(&self, nonblocking: bool) -> std::io::Result<()> {
        self.tcp().set_nonblocking(nonblocking)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        self.tcp().set_read_timeout(timeout)
    }

    fn shutdown(&mut self) -> std::io::Result<()> {
        if let StreamInner::Tls(stream) = &mut self.inner {
            let stream = &mut **stream;
            stream.conn.send_close_notify();
            // Best effort: the peer may already be gone.
            let _ = stream.conn.complete_io(&mut stream.sock);
        }
        self.tcp().shutdown(Shutdown::Both)
    }
}

impl std::fmt::Debug for StreamConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_tls() { "tls" } else { "tcp" };
        let mut dbg = f.debug_struct("StreamConnection");
        dbg.field("type", &kind);
        if let Ok(addr) = self.peer_addr() {
            dbg.field("peer", &addr);
        }
        dbg.finish()
    }
}
