//! Per-recipient delivery to the recipient's mail exchangers.

use bytes::Bytes;
use directmail_smtp::connection::{run_session, upgrade_and_retry};
use directmail_smtp::{Address, Protocol, ProtocolConfig, SessionOutcome};
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio::io::AsyncWriteExt;
use tokio_rustls::TlsConnector;

use crate::config::DeliveryConfig;
use crate::connector::{Connection, connect_in_order};
use crate::dns::{DnsResolver, ExchangerLookup, resolve_exchangers};
use crate::error::{Error, Result};

/// Delivers messages straight to each recipient's exchangers.
#[derive(Clone)]
pub struct Deliverer<L = DnsResolver> {
    config: DeliveryConfig,
    lookup: L,
    connector: TlsConnector,
}

impl<L> std::fmt::Debug for Deliverer<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deliverer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Deliverer<DnsResolver> {
    /// Creates a deliverer that resolves exchangers through DNS.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResolverSetup`] if the system resolver configuration
    /// cannot be read.
    pub fn new(config: DeliveryConfig) -> Result<Self> {
        let lookup = DnsResolver::new(config.dns_timeout)?;
        Ok(Self::with_lookup(config, lookup))
    }
}

impl<L: ExchangerLookup> Deliverer<L> {
    /// Creates a deliverer with a custom exchanger source.
    #[must_use]
    pub fn with_lookup(config: DeliveryConfig, lookup: L) -> Self {
        let connector = TlsConnector::from(config.tls.clone());
        Self {
            config,
            lookup,
            connector,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Delivers `body` from `sender` to a single `recipient`.
    ///
    /// Exchangers are dialed in preference order until one accepts the TCP
    /// connection; the session then runs on that exchanger only. If the
    /// server offers STARTTLS the session continues over TLS on the same
    /// connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] before any network activity if
    /// either address is unusable, a lookup error if the recipient domain
    /// has no usable MX records, [`Error::NoReachableHost`] if no exchanger
    /// accepts a connection, and [`Error::Session`] if the session fails.
    pub async fn deliver(
        &self,
        sender: &str,
        recipient: &str,
        body: impl Into<Bytes>,
    ) -> Result<()> {
        let sender = parse_address(sender)?;
        let recipient = parse_address(recipient)?;
        let domain = recipient.domain().to_string();
        tracing::info!(recipient = %recipient, "starting delivery");

        let hosts = resolve_exchangers(&self.lookup, &domain).await?;
        let conn = connect_in_order(
            &domain,
            &hosts,
            self.config.port,
            self.config.connect_timeout,
        )
        .await?;

        let host = conn.host.clone();
        let sender_host = self
            .config
            .helo_name
            .clone()
            .unwrap_or_else(|| sender.domain().to_string());
        let protocol = ProtocolConfig::new(sender_host, sender, recipient.clone(), body);

        match self.attempt(conn, &protocol).await {
            Ok(()) => {
                tracing::info!(recipient = %recipient, host, "message delivered");
                Ok(())
            }
            Err(source) => {
                tracing::warn!(?source, recipient = %recipient, host, "delivery failed");
                Err(Error::Session {
                    recipient: recipient.to_string(),
                    host,
                    source,
                })
            }
        }
    }

    /// Runs one session on an open connection, upgrading to TLS on request.
    ///
    /// The connection is closed afterwards whatever the outcome.
    async fn attempt(
        &self,
        conn: Connection,
        protocol: &ProtocolConfig,
    ) -> directmail_smtp::Result<()> {
        let Connection { host, mut stream } = conn;
        let timeouts = self.config.timeouts();

        let outcome = run_session(
            &mut stream,
            Protocol::new(protocol.clone()),
            timeouts.response,
        )
        .await;

        match outcome {
            Ok(SessionOutcome::UpgradeRequired) => {
                tracing::debug!(host, "upgrading to TLS");
                upgrade_and_retry(stream, &self.connector, &host, protocol, timeouts).await
            }
            Ok(SessionOutcome::Completed) => {
                close(&mut stream).await;
                Ok(())
            }
            Err(e) => {
                close(&mut stream).await;
                Err(e)
            }
        }
    }
}

impl<L> Deliverer<L>
where
    L: ExchangerLookup + Clone + 'static,
{
    /// Delivers `body` to every recipient concurrently.
    ///
    /// Each recipient gets its own task. The call returns as soon as one
    /// delivery fails; the others keep running in the background so no
    /// session is dropped mid-transaction. An empty recipient list succeeds
    /// without any network activity.
    ///
    /// # Errors
    ///
    /// Returns the error of the delivery that failed first.
    pub async fn send_mail<S>(
        &self,
        sender: &str,
        recipients: &[S],
        body: impl Into<Bytes>,
    ) -> Result<()>
    where
        S: AsRef<str>,
    {
        let body = body.into();
        let mut pending: FuturesUnordered<_> = recipients
            .iter()
            .map(|recipient| {
                let deliverer = self.clone();
                let sender = sender.to_string();
                let recipient = recipient.as_ref().to_string();
                let body = body.clone();
                tokio::spawn(async move { deliverer.deliver(&sender, &recipient, body).await })
            })
            .collect();

        while let Some(joined) = pending.next().await {
            if let Err(e) = joined? {
                tracing::warn!(
                    remaining = pending.len(),
                    "delivery failed, not waiting for the others"
                );
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Delivers `body` to one recipient with the default configuration.
///
/// # Errors
///
/// See [`Deliverer::deliver`].
pub async fn deliver(sender: &str, recipient: &str, body: impl Into<Bytes>) -> Result<()> {
    Deliverer::new(DeliveryConfig::default())?
        .deliver(sender, recipient, body)
        .await
}

/// Delivers `body` to every recipient with the default configuration.
///
/// # Errors
///
/// See [`Deliverer::send_mail`].
pub async fn send_mail<S>(sender: &str, recipients: &[S], body: impl Into<Bytes>) -> Result<()>
where
    S: AsRef<str>,
{
    Deliverer::new(DeliveryConfig::default())?
        .send_mail(sender, recipients, body)
        .await
}

fn parse_address(address: &str) -> Result<Address> {
    Address::new(address).map_err(|_| Error::InvalidAddress(address.to_string()))
}

async fn close(stream: &mut tokio::net::TcpStream) {
    if let Err(e) = stream.shutdown().await {
        tracing::debug!(?e, "shutdown failed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::dns::Exchanger;

    #[derive(Clone, Default)]
    struct CountingLookup {
        calls: Arc<AtomicUsize>,
    }

    impl ExchangerLookup for CountingLookup {
        async fn lookup_exchangers(&self, _domain: &str) -> Result<Vec<Exchanger>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    fn counting_deliverer() -> Deliverer<CountingLookup> {
        Deliverer::with_lookup(DeliveryConfig::default(), CountingLookup::default())
    }

    #[tokio::test]
    async fn test_invalid_recipient_skips_lookup() {
        let deliverer = counting_deliverer();
        let err = deliverer
            .deliver("alice@example.org", "not-an-address", "hi")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidAddress(ref a) if a == "not-an-address"));
        assert_eq!(err.to_string(), "invalid email address");
        assert_eq!(deliverer.lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_sender_skips_lookup() {
        let deliverer = counting_deliverer();
        let err = deliverer
            .deliver("alice@localhost", "bob@example.com", "hi")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidAddress(_)));
        assert_eq!(deliverer.lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_mx_records() {
        let deliverer = counting_deliverer();
        let err = deliverer
            .deliver("alice@example.org", "bob@example.com", "hi")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "can not resolve Mx of <example.com>");
        assert_eq!(deliverer.lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_send_mail_empty_recipients() {
        let deliverer = counting_deliverer();
        let recipients: [&str; 0] = [];
        deliverer
            .send_mail("alice@example.org", &recipients, "hi")
            .await
            .unwrap();
        assert_eq!(deliverer.lookup.calls.load(Ordering::SeqCst), 0);
    }
}
