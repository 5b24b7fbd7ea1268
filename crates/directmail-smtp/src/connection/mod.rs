//! Connection plumbing: TCP/TLS streams and the session loop that wires a
//! stream to a [`Protocol`](crate::protocol::Protocol).

mod session;
mod stream;

pub use session::{SessionOutcome, run_session, upgrade_and_retry};
pub use stream::{connect, create_tls_connector, default_client_config, start_tls};

use std::time::Duration;

/// Deadlines applied while a session is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Limit for each read from, or write to, the server.
    pub response: Duration,
    /// Limit for the TLS handshake after STARTTLS.
    pub tls_handshake: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            response: Duration::from_secs(60),
            tls_handshake: Duration::from_secs(30),
        }
    }
}
