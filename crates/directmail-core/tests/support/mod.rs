#![allow(dead_code)]

pub mod mock_server;

use std::sync::Arc;

use directmail_core::{Exchanger, ExchangerLookup, Result};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use tokio_rustls::TlsAcceptor;

/// Lookup returning a fixed exchanger list for every domain.
#[derive(Clone)]
pub struct StaticLookup(pub Vec<Exchanger>);

impl ExchangerLookup for StaticLookup {
    async fn lookup_exchangers(&self, _domain: &str) -> Result<Vec<Exchanger>> {
        Ok(self.0.clone())
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Self-signed certificate for `host`: a server acceptor presenting it and a
/// client config trusting only it.
pub fn self_signed_tls(host: &str) -> (TlsAcceptor, Arc<ClientConfig>) {
    let cert = rcgen::generate_simple_self_signed(vec![host.to_string()]).unwrap();
    let cert_der = CertificateDer::from(cert.serialize_der().unwrap());
    let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
        cert.serialize_private_key_der(),
    ));

    let server = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der.clone()], key_der)
        .unwrap();

    let mut roots = RootCertStore::empty();
    roots.add(cert_der).unwrap();
    let client = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    (TlsAcceptor::from(Arc::new(server)), Arc::new(client))
}
