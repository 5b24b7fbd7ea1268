//! Low-level SMTP stream handling.

use crate::error::{Error, Result};
use rustls::pki_types::ServerName;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::{
    TlsConnector,
    client::TlsStream,
    rustls::{ClientConfig, RootCertStore},
};

/// Connects to an SMTP server over plain TCP.
///
/// # Errors
///
/// Returns an error if the connection fails or does not complete within
/// `deadline`.
pub async fn connect(hostname: &str, port: u16, deadline: Duration) -> Result<TcpStream> {
    let addr = format!("{hostname}:{port}");
    let stream = tokio::time::timeout(deadline, TcpStream::connect(&addr))
        .await
        .map_err(|_| Error::Timeout(deadline))??;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Runs a TLS client handshake over an already connected stream.
///
/// The certificate is checked against `hostname`.
///
/// # Errors
///
/// Returns an error if the hostname is not a valid server name or the
/// handshake fails.
pub async fn start_tls<S>(
    stream: S,
    connector: &TlsConnector,
    hostname: &str,
) -> Result<TlsStream<S>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let server_name = ServerName::try_from(hostname.to_string())?;
    let tls_stream = connector.connect(server_name, stream).await?;
    Ok(tls_stream)
}

/// Creates a TLS connector with the webpki root certificates.
#[must_use]
pub fn create_tls_connector() -> TlsConnector {
    TlsConnector::from(default_client_config())
}

/// Builds the default client configuration (webpki roots, no client auth).
#[must_use]
pub fn default_client_config() -> Arc<ClientConfig> {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tls_connector() {
        let config = default_client_config();
        assert!(config.alpn_protocols.is_empty());
        let _connector = create_tls_connector();
    }

    #[tokio::test]
    async fn test_start_tls_rejects_invalid_name() {
        let (client, _server) = tokio::io::duplex(64);
        let connector = create_tls_connector();
        let err = start_tls(client, &connector, "not a hostname!").await.unwrap_err();
        assert!(matches!(err, Error::InvalidDnsName(_)));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = connect("127.0.0.1", port, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn test_connect_succeeds() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let stream = connect("127.0.0.1", port, Duration::from_secs(5)).await.unwrap();
        assert_eq!(stream.peer_addr().unwrap().port(), port);
    }
}
