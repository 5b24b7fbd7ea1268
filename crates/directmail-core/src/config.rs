//! Delivery configuration types.

use std::sync::Arc;
use std::time::Duration;

use directmail_smtp::connection::{Timeouts, default_client_config};
use rustls::ClientConfig;

/// Settings shared by every delivery a [`Deliverer`](crate::Deliverer) makes.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Port dialed on each exchanger.
    pub port: u16,
    /// Deadline for one TCP connect attempt.
    pub connect_timeout: Duration,
    /// Deadline for each read or write during a session.
    pub response_timeout: Duration,
    /// Deadline for the STARTTLS handshake.
    pub tls_handshake_timeout: Duration,
    /// Deadline for one MX query.
    pub dns_timeout: Duration,
    /// HELO/EHLO name. Defaults to the sender's domain.
    pub helo_name: Option<String>,
    /// TLS client settings used after STARTTLS.
    pub tls: Arc<ClientConfig>,
}

impl DeliveryConfig {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> DeliveryConfigBuilder {
        DeliveryConfigBuilder::new()
    }

    /// Returns the per-session deadlines.
    #[must_use]
    pub const fn timeouts(&self) -> Timeouts {
        Timeouts {
            response: self.response_timeout,
            tls_handshake: self.tls_handshake_timeout,
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        DeliveryConfigBuilder::new().build()
    }
}

/// Builder for [`DeliveryConfig`].
#[derive(Debug, Clone)]
pub struct DeliveryConfigBuilder {
    port: u16,
    connect_timeout: Duration,
    response_timeout: Duration,
    tls_handshake_timeout: Duration,
    dns_timeout: Duration,
    helo_name: Option<String>,
    tls: Option<Arc<ClientConfig>>,
}

impl DeliveryConfigBuilder {
    /// Creates a builder with port 25 and the default deadlines.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            port: directmail_smtp::SMTP_PORT,
            connect_timeout: Duration::from_secs(30),
            response_timeout: Duration::from_secs(60),
            tls_handshake_timeout: Duration::from_secs(30),
            dns_timeout: Duration::from_secs(5),
            helo_name: None,
            tls: None,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the read/write timeout.
    #[must_use]
    pub const fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Sets the TLS handshake timeout.
    #[must_use]
    pub const fn tls_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.tls_handshake_timeout = timeout;
        self
    }

    /// Sets the DNS query timeout.
    #[must_use]
    pub const fn dns_timeout(mut self, timeout: Duration) -> Self {
        self.dns_timeout = timeout;
        self
    }

    /// Sets the HELO/EHLO name.
    #[must_use]
    pub fn helo_name(mut self, name: impl Into<String>) -> Self {
        self.helo_name = Some(name.into());
        self
    }

    /// Replaces the TLS client settings.
    #[must_use]
    pub fn tls(mut self, tls: Arc<ClientConfig>) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> DeliveryConfig {
        DeliveryConfig {
            port: self.port,
            connect_timeout: self.connect_timeout,
            response_timeout: self.response_timeout,
            tls_handshake_timeout: self.tls_handshake_timeout,
            dns_timeout: self.dns_timeout,
            helo_name: self.helo_name,
            tls: self.tls.unwrap_or_else(default_client_config),
        }
    }
}

impl Default for DeliveryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DeliveryConfig::default();
        assert_eq!(config.port, 25);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.response_timeout, Duration::from_secs(60));
        assert_eq!(config.tls_handshake_timeout, Duration::from_secs(30));
        assert_eq!(config.dns_timeout, Duration::from_secs(5));
        assert!(config.helo_name.is_none());
    }

    #[test]
    fn test_builder() {
        let tls = default_client_config();
        let config = DeliveryConfig::builder()
            .port(2525)
            .connect_timeout(Duration::from_secs(3))
            .response_timeout(Duration::from_secs(4))
            .tls_handshake_timeout(Duration::from_secs(5))
            .dns_timeout(Duration::from_secs(1))
            .helo_name("relay.example.org")
            .tls(Arc::clone(&tls))
            .build();

        assert_eq!(config.port, 2525);
        assert_eq!(config.helo_name.as_deref(), Some("relay.example.org"));
        assert!(Arc::ptr_eq(&config.tls, &tls));

        let timeouts = config.timeouts();
        assert_eq!(timeouts.response, Duration::from_secs(4));
        assert_eq!(timeouts.tls_handshake, Duration::from_secs(5));
    }
}
