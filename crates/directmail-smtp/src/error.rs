//! Error types for SMTP operations.

use std::io;
use std::time::Duration;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
///
/// A server offering STARTTLS is not an error; the engine reports it through
/// [`Progress::UpgradeRequired`](crate::protocol::Progress::UpgradeRequired).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Invalid email address.
    #[error("invalid email address")]
    InvalidAddress(String),

    /// A reply line that does not follow `NNN<SP|->text` framing, or a
    /// continuation line whose code differs from the first line of its group.
    #[error("invalid smtp server message: {0}")]
    MalformedResponse(String),

    /// The peer closed the stream with a partial line still buffered.
    #[error("incomplete smtp server message: {0:?}")]
    IncompleteResponse(String),

    /// Server answered with a code the client does not act on.
    #[error("get code {code} and response {message}")]
    UnexpectedResponse {
        /// Reply code (e.g., 550).
        code: u16,
        /// Reply text from server.
        message: String,
    },

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Protocol error (unexpected state).
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Creates an unexpected-response error from a reply code and message.
    #[must_use]
    pub fn unexpected(code: u16, message: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            code,
            message: message.into(),
        }
    }

    /// Returns the reply code carried by this error, if any.
    #[must_use]
    pub const fn reply_code(&self) -> Option<u16> {
        match self {
            Self::UnexpectedResponse { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::UnexpectedResponse { code, .. } if *code >= 500 && *code < 600)
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::UnexpectedResponse { code, .. } if *code >= 400 && *code < 500)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_carries_code() {
        let err = Error::unexpected(550, "no such user");
        assert_eq!(err.reply_code(), Some(550));
        assert!(err.is_permanent());
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "get code 550 and response no such user");
    }

    #[test]
    fn test_transient_code() {
        let err = Error::unexpected(451, "try later");
        assert!(err.is_transient());
        assert!(!err.is_permanent());
    }

    #[test]
    fn test_invalid_address_message() {
        let err = Error::InvalidAddress("nobody".into());
        assert_eq!(err.to_string(), "invalid email address");
        assert_eq!(err.reply_code(), None);
    }
}
