use std::fmt;

use muxstream_transport::{SecurityMode, StreamConnection, TlsOptions};
use tracing::info;

use crate::error::Result;
use crate::handshake::Redacted;
use crate::session::{Session, SessionConfig};

/// Where and how to reach a streaming node.
#[derive(Clone)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    /// Session token issued by the bootstrap API.
    pub token: String,
    pub security: SecurityMode,
    pub tls: TlsOptions,
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("token", &Redacted(&self.token))
            .field("security", &self.security)
            .field("tls", &self.tls)
            .finish()
    }
}

/// Connect to a node and complete the handshake.
pub fn connect(
    options: &ConnectOptions,
    config: SessionConfig,
) -> Result<Session<StreamConnection>> {
    let stream = muxstream_transport::connect(
        &options.host,
        options.port,
        options.security,
        &options.tls,
    )?;
    let session = Session::establish(stream, &options.token, options.security, config)?;
    info!(
        host = %options.host,
        port = options.port,
        security = %options.security,
        "session established"
    );
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datagram::Datagram;
    use crate::error::SessionError;
    use crate::shutdown::ShutdownSignal;
    use crate::session::SessionEnd;
    use crate::testing::{fake_node, write_datagram};
    use crate::Consumer;

    fn options(port: u16) -> ConnectOptions {
        ConnectOptions {
            host: "127.0.0.1".to_string(),
            port,
            token: "grant-token".to_string(),
            security: SecurityMode::None,
            tls: TlsOptions::default(),
        }
    }

    #[test]
    fn connects_and_runs_until_bye() {
        let (port, node) = fake_node(0x01, |socket| {
            write_datagram(socket, &Datagram::keepalive());
            write_datagram(socket, &Datagram::bye("done"));
        });

        let mut session = connect(&options(port), SessionConfig::default()).unwrap();
        assert!(!session.get_ref().is_tls());
        let end = session
            .run(&mut Consumer::new(), &ShutdownSignal::new())
            .unwrap();

        assert_eq!(
            end,
            SessionEnd::Bye {
                reason: bytes::Bytes::from_static(b"done")
            }
        );
        assert_eq!(node.join().unwrap().as_ref(), b"grant-token");
    }

    #[test]
    fn version_rejection_surfaces_as_handshake_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let node = std::thread::spawn(move || {
            use std::io::{Read, Write};
            let (mut socket, _) = listener.accept().unwrap();
            let mut byte = [0u8; 1];
            socket.read_exact(&mut byte).unwrap();
            socket.write_all(&[0x02]).unwrap();
        });

        let err = connect(&options(port), SessionConfig::default()).unwrap_err();
        assert!(matches!(err, SessionError::Handshake(_)));
        node.join().unwrap();
    }

    #[test]
    fn refused_connection_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = connect(&options(port), SessionConfig::default()).unwrap_err();
        assert!(matches!(err, SessionError::Transport(_)));
    }

    #[test]
    fn debug_redacts_token() {
        let rendered = format!("{:?}", options(1));
        assert!(!rendered.contains("grant-token"));
    }

    #[test]
    fn tls_hangup_without_close_notify_is_disconnect() {
        use std::fs::File;
        use std::io::{BufReader, Read, Write};
        use std::net::{Shutdown, TcpListener};
        use std::path::PathBuf;
        use std::sync::Arc;

        let testdata =
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../muxstream-transport/testdata");
        let mut pem = BufReader::new(File::open(testdata.join("localhost.pem")).unwrap());
        let certs = rustls_pemfile::certs(&mut pem)
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        let mut pem = BufReader::new(File::open(testdata.join("localhost.key")).unwrap());
        let key = rustls_pemfile::private_key(&mut pem).unwrap().unwrap();
        let server_config = rustls::ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let node = std::thread::spawn(move || {
            let (socket, _) = listener.accept().unwrap();
            let conn = rustls::ServerConnection::new(Arc::new(server_config)).unwrap();
            let mut tls = rustls::StreamOwned::new(conn, socket);

            let mut version = [0u8; 1];
            tls.read_exact(&mut version).unwrap();
            tls.write_all(&[0x01]).unwrap();
            tls.flush().unwrap();

            let mut header = [0u8; 4];
            tls.read_exact(&mut header).unwrap();
            let mut auth = vec![0u8; u16::from_be_bytes([header[2], header[3]]) as usize];
            tls.read_exact(&mut auth).unwrap();

            tls.sock.shutdown(Shutdown::Both).unwrap();
            (tls, auth)
        });

        let options = ConnectOptions {
            host: "localhost".to_string(),
            security: SecurityMode::Tls,
            tls: TlsOptions {
                ca_file: Some(testdata.join("localhost.pem")),
            },
            ..options(port)
        };
        let mut session = connect(&options, SessionConfig::default()).unwrap();
        assert!(session.get_ref().is_tls());

        let err = session
            .run(&mut Consumer::new(), &ShutdownSignal::new())
            .unwrap_err();
        assert!(matches!(err, SessionError::Disconnected), "got {err:?}");

        let (_tls, auth) = node.join().unwrap();
        assert_eq!(auth.first(), Some(&crate::datagram::TOKEN_AUTH));
    }
}
