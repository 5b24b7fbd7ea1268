//! Ordered connection attempts across a domain's exchangers.

use std::time::Duration;

use directmail_smtp::connection;
use tokio::net::TcpStream;

use crate::error::{Error, Result};

/// An open connection to one exchanger.
#[derive(Debug)]
pub struct Connection {
    /// Hostname that accepted the connection.
    pub host: String,
    /// The TCP stream.
    pub stream: TcpStream,
}

/// Dials `hosts` in order and returns the first connection that succeeds.
///
/// Each attempt is bounded by `connect_timeout`. Failures are logged and the
/// next host is tried.
///
/// # Errors
///
/// Returns [`Error::NoReachableHost`] carrying the first host's failure when
/// every attempt fails, and [`Error::NoMxRecords`] when `hosts` is empty.
pub async fn connect_in_order(
    domain: &str,
    hosts: &[String],
    port: u16,
    connect_timeout: Duration,
) -> Result<Connection> {
    let mut first_error = None;

    for host in hosts {
        match connection::connect(host, port, connect_timeout).await {
            Ok(stream) => {
                tracing::debug!(host, port, "connected");
                return Ok(Connection {
                    host: host.clone(),
                    stream,
                });
            }
            Err(e) => {
                tracing::warn!(?e, host, port, "connect failed, trying next exchanger");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(source) => Err(Error::NoReachableHost {
            domain: domain.to_string(),
            source,
        }),
        None => Err(Error::NoMxRecords {
            domain: domain.to_string(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_first_reachable_wins() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        // Nothing listens on 127.0.0.2 for this port.
        let hosts = vec!["127.0.0.2".to_string(), "127.0.0.1".to_string()];
        let conn = connect_in_order("example.com", &hosts, port, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(conn.host, "127.0.0.1");
    }

    #[tokio::test]
    async fn test_stops_at_first_success() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let hosts = vec!["127.0.0.1".to_string(), "127.0.0.2".to_string()];
        let conn = connect_in_order("example.com", &hosts, port, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(conn.host, "127.0.0.1");
    }

    #[tokio::test]
    async fn test_all_unreachable() {
        let port = closed_port().await;
        let hosts = vec!["127.0.0.1".to_string(), "127.0.0.2".to_string()];
        let err = connect_in_order("example.com", &hosts, port, Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::NoReachableHost { ref domain, source: directmail_smtp::Error::Io(_) }
                if domain == "example.com"
        ));
        assert_eq!(
            err.to_string(),
            "can not connect to any SMTP server of example.com"
        );
    }

    #[tokio::test]
    async fn test_empty_host_list() {
        let err = connect_in_order("example.com", &[], 25, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoMxRecords { .. }));
    }
}
