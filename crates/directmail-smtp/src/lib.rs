//! # directmail-smtp
//!
//! SMTP client plumbing for delivering a message straight to a recipient's
//! mail exchanger.
//!
//! ## Features
//!
//! - **Sans-I/O engine**: [`Protocol`] turns server replies into the next
//!   command and never performs I/O itself
//! - **Opportunistic TLS**: STARTTLS is issued whenever the server offers it,
//!   and the session resumes over TLS on the same connection
//! - **Deadlines**: every read, write and TLS handshake is bounded
//!
//! ## Quick Start
//!
//! ```ignore
//! use directmail_smtp::connection::{self, SessionOutcome, Timeouts};
//! use directmail_smtp::protocol::{Protocol, ProtocolConfig};
//! use directmail_smtp::Address;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> directmail_smtp::Result<()> {
//!     let config = ProtocolConfig::new(
//!         "example.org",
//!         Address::new("alice@example.org")?,
//!         Address::new("bob@example.com")?,
//!         b"Subject: hi\r\n\r\nhello\r\n".to_vec(),
//!     );
//!     let timeouts = Timeouts::default();
//!
//!     let mut stream = connection::connect("mx.example.com", 25, Duration::from_secs(30)).await?;
//!     match connection::run_session(&mut stream, Protocol::new(config.clone()), timeouts.response).await? {
//!         SessionOutcome::Completed => {}
//!         SessionOutcome::UpgradeRequired => {
//!             let connector = connection::create_tls_connector();
//!             connection::upgrade_and_retry(stream, &connector, "mx.example.com", &config, timeouts)
//!                 .await?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Session Flow
//!
//! ```text
//! 220 ──→ EHLO/HELO ──→ 250 ──→ MAIL FROM ──→ RCPT TO ──→ DATA ──→ 354 ──→ body ──→ QUIT ──→ 221
//!                        │
//!                        └─ STARTTLS advertised ──→ STARTTLS ──→ 220 ──→ TLS ──→ EHLO ──→ ...
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders
//! - [`connection`]: TCP/TLS streams and the session loop
//! - [`parser`]: Reply line parser
//! - [`protocol`]: Sans-I/O client state machine
//! - [`types`]: Core SMTP types (addresses, replies)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod protocol;
pub mod types;

pub use connection::{SessionOutcome, Timeouts};
pub use error::{Error, Result};
pub use protocol::{Progress, Protocol, ProtocolConfig, Transmit};
pub use types::{Address, Reply, ReplyCode, extract_domain};

/// Default SMTP port for server-to-server delivery.
pub const SMTP_PORT: u16 = 25;
