//! # directmail-core
//!
//! Sends a finished message straight to each recipient's mail exchanger,
//! without a relay.
//!
//! For every recipient the domain's MX records are resolved and dialed in
//! preference order. The first exchanger that accepts the connection gets
//! the whole SMTP session; STARTTLS is used whenever it is offered.
//! Recipients are delivered concurrently.
//!
//! ```ignore
//! use directmail_core::{Deliverer, DeliveryConfig};
//!
//! #[tokio::main]
//! async fn main() -> directmail_core::Result<()> {
//!     let deliverer = Deliverer::new(DeliveryConfig::default())?;
//!     deliverer
//!         .send_mail(
//!             "alice@example.org",
//!             &["bob@example.com", "carol@example.net"],
//!             "From: alice@example.org\r\nSubject: hi\r\n\r\nhello\r\n",
//!         )
//!         .await
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod connector;
pub mod dns;
mod error;
pub mod service;

pub use config::{DeliveryConfig, DeliveryConfigBuilder};
pub use connector::{Connection, connect_in_order};
pub use directmail_smtp::{Address, extract_domain};
pub use dns::{DnsResolver, Exchanger, ExchangerLookup, order_exchangers, resolve_exchangers};
pub use error::{Error, Result};
pub use service::{Deliverer, deliver, send_mail};
