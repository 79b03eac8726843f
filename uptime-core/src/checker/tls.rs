use rustls::{ClientConfig, RootCertStore, pki_types::ServerName};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use crate::Result;

/// Performs a bare TLS handshake against `host:port` using the platform trust store.
#[derive(Clone)]
pub struct TlsProbe {
    connector: TlsConnector,
    timeout: Duration,
}

impl TlsProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut roots = RootCertStore::empty();
        let native = rustls_native_certs::load_native_certs();
        for err in &native.errors {
            warn!(error = %err, "Failed to load a platform root certificate");
        }
        let (added, ignored) = roots.add_parsable_certificates(native.certs);
        if added == 0 {
            warn!("No platform root certificates loaded; every TLS probe will fail verification");
        }
        debug!(added, ignored, "Loaded TLS trust roots");

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            timeout,
        })
    }

    /// Returns the handshake failure text, or `Ok(())` when the peer presented a
    /// certificate chain that verifies for `host`.
    pub async fn handshake(&self, host: &str, port: u16) -> std::result::Result<(), String> {
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| format!("invalid server name {host}: {e}"))?;

        let attempt = async {
            let tcp = TcpStream::connect((host, port))
                .await
                .map_err(|e| format!("tcp connect to {host}:{port} failed: {e}"))?;
            self.connector
                .connect(server_name, tcp)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string())
        };

        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(format!("tls handshake with {host}:{port} timed out")),
        }
    }
}
