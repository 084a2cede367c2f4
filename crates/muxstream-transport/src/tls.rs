use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::pki_types::CertificateDer;
use rustls::{ClientConfig, RootCertStore};
use tracing::debug;

use crate::error::{Result, TransportError};

/// TLS settings for session streams.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// PEM bundle of trusted roots. `None` trusts the bundled Mozilla roots.
    pub ca_file: Option<PathBuf>,
}

/// Build the rustls client configuration for session streams.
///
/// Server certificates are verified against the configured roots and the
/// host name the caller connects to.
pub fn build_client_config(options: &TlsOptions) -> Result<Arc<ClientConfig>> {
    let roots = match &options.ca_file {
        Some(path) => load_root_store(path)?,
        None => RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        },
    };

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(Arc::new(config))
}

fn load_root_store(path: &Path) -> Result<RootCertStore> {
    let ca_error = |source: std::io::Error| TransportError::CaBundle {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(ca_error)?;
    let mut reader = BufReader::new(file);

    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<_, _>>()
        .map_err(ca_error)?;

    if certs.is_empty() {
        return Err(ca_error(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "CA bundle did not contain any certificates",
        )));
    }

    let mut store = RootCertStore::empty();
    for cert in certs {
        store.add(cert)?;
    }
    debug!(path = ?path, roots = store.len(), "loaded CA bundle");

    Ok(store)
}
