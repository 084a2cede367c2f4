use std::net::TcpStream;

use rustls::pki_types::ServerName;
use rustls::{ClientConnection, StreamOwned};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::security::SecurityMode;
use crate::tls::{build_client_config, TlsOptions};
use crate::traits::StreamConnection;

/// Open a session stream to `host:port` (blocking).
///
/// With [`SecurityMode::Tls`] the TLS handshake is completed before this
/// returns, so certificate or server-name failures surface here rather than
/// on the first datagram.
pub fn connect(
    host: &str,
    port: u16,
    security: SecurityMode,
    tls: &TlsOptions,
) -> Result<StreamConnection> {
    let addr = format!("{host}:{port}");
    let stream = TcpStream::connect(&addr).map_err(|source| TransportError::Connect {
        addr: addr.clone(),
        source,
    })?;
    stream.set_nodelay(true)?;
    debug!(%addr, "tcp connection established");

    if !security.uses_tls() {
        info!(%addr, tls = false, "connected");
        return Ok(StreamConnection::plain(stream));
    }

    let config = build_client_config(tls)?;
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| TransportError::InvalidServerName(host.to_string()))?;
    let conn = ClientConnection::new(config, server_name)?;
    let mut tls_stream = StreamOwned::new(conn, stream);

    while tls_stream.conn.is_handshaking() {
        tls_stream.conn.complete_io(&mut tls_stream.sock)?;
    }
    info!(%addr, tls = true, "connected; TLS handshake complete");

    Ok(StreamConnection::tls(tls_stream))
}
