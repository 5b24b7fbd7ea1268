//! Core SMTP types.

mod address;
mod reply;

pub use address::{Address, extract_domain};
pub use reply::{Reply, ReplyCode};
