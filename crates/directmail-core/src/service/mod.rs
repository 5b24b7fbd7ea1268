//! Delivery services.

mod delivery;

pub use delivery::{Deliverer, deliver, send_mail};
