//! Error types for delivery.

use thiserror::Error;

/// Errors that can occur while delivering a message.
#[derive(Debug, Error)]
pub enum Error {
    /// Sender or recipient is not a usable email address.
    #[error("invalid email address")]
    InvalidAddress(String),

    /// The resolver failed to set up.
    #[error("DNS resolver setup failed: {0}")]
    ResolverSetup(#[source] hickory_resolver::ResolveError),

    /// The MX query failed.
    #[error("can not resolve Mx of <{domain}>")]
    Resolve {
        /// Queried domain.
        domain: String,
        /// Resolver error.
        #[source]
        source: hickory_resolver::ResolveError,
    },

    /// The domain publishes no MX records.
    #[error("can not resolve Mx of <{domain}>")]
    NoMxRecords {
        /// Queried domain.
        domain: String,
    },

    /// Every exchanger refused or timed out.
    #[error("can not connect to any SMTP server of {domain}")]
    NoReachableHost {
        /// Recipient domain.
        domain: String,
        /// Failure from the first exchanger tried.
        #[source]
        source: directmail_smtp::Error,
    },

    /// A session with a connected exchanger failed.
    #[error("delivery to <{recipient}> via {host} failed: {source}")]
    Session {
        /// Recipient being delivered to.
        recipient: String,
        /// Exchanger the session ran against.
        host: String,
        /// Protocol, I/O or TLS failure.
        #[source]
        source: directmail_smtp::Error,
    },

    /// A delivery task panicked or was cancelled.
    #[error("delivery task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    /// Returns the SMTP reply code if the server rejected the message.
    #[must_use]
    pub const fn reply_code(&self) -> Option<u16> {
        match self {
            Self::Session { source, .. } => source.reply_code(),
            _ => None,
        }
    }

    /// Returns true if retrying later could succeed.
    ///
    /// Lookup and connection failures count as transient, as do 4xx replies.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::InvalidAddress(_)
            | Self::ResolverSetup(_)
            | Self::NoMxRecords { .. }
            | Self::Task(_) => false,
            Self::Resolve { .. } | Self::NoReachableHost { .. } => true,
            Self::Session { source, .. } => !source.is_permanent(),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::error::Error as _;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            Error::InvalidAddress("nope".into()).to_string(),
            "invalid email address"
        );
        assert_eq!(
            Error::NoMxRecords {
                domain: "example.com".into()
            }
            .to_string(),
            "can not resolve Mx of <example.com>"
        );
        let err = Error::NoReachableHost {
            domain: "example.com".into(),
            source: directmail_smtp::Error::Timeout(Duration::from_secs(1)),
        };
        assert_eq!(
            err.to_string(),
            "can not connect to any SMTP server of example.com"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_session_carries_reply() {
        let err = Error::Session {
            recipient: "bob@example.com".into(),
            host: "mx.example.com".into(),
            source: directmail_smtp::Error::unexpected(550, "no such user"),
        };
        assert_eq!(err.reply_code(), Some(550));
        assert!(!err.is_transient());
        assert!(err.to_string().contains("550"));
        assert!(err.to_string().contains("no such user"));

        let err = Error::Session {
            recipient: "bob@example.com".into(),
            host: "mx.example.com".into(),
            source: directmail_smtp::Error::unexpected(451, "try later"),
        };
        assert!(err.is_transient());
    }
}
