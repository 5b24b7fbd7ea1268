//! Email address types.

use crate::error::{Error, Result};

/// Email address for the SMTP envelope.
///
/// Accepts one `@`, a local part without whitespace, and a dotted domain
/// whose last label has at least two characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    addr: String,
    at: usize,
}

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is malformed.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        match split(&addr) {
            Some((local, _)) => {
                let at = local.len();
                Ok(Self { addr, at })
            }
            None => Err(Error::InvalidAddress(addr)),
        }
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.addr
    }

    /// Returns the local part (before `@`).
    #[must_use]
    pub fn local_part(&self) -> &str {
        &self.addr[..self.at]
    }

    /// Returns the domain part (after `@`).
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.addr[self.at + 1..]
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.addr)
    }
}

impl std::str::FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Returns the domain of an email address.
///
/// ```
/// # use directmail_smtp::types::extract_domain;
/// assert_eq!(extract_domain("user@mail.example.com").unwrap(), "mail.example.com");
/// assert!(extract_domain("user@localhost").is_err());
/// ```
///
/// # Errors
///
/// Returns [`Error::InvalidAddress`] if the address is malformed.
pub fn extract_domain(address: &str) -> Result<&str> {
    split(address)
        .map(|(_, domain)| domain)
        .ok_or_else(|| Error::InvalidAddress(address.to_string()))
}

fn split(addr: &str) -> Option<(&str, &str)> {
    let (local, domain) = addr.split_once('@')?;
    if local.is_empty() || local.chars().any(char::is_whitespace) {
        return None;
    }

    let mut labels = 0;
    let mut last = "";
    for label in domain.split('.') {
        if label.is_empty() || label.chars().any(is_excluded) {
            return None;
        }
        labels += 1;
        last = label;
    }

    (labels >= 2 && last.chars().count() >= 2).then_some((local, domain))
}

fn is_excluded(c: char) -> bool {
    c.is_whitespace() || c == '@' || c == ','
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
        assert_eq!(addr.local_part(), "user");
        assert_eq!(addr.domain(), "example.com");
    }

    #[test]
    fn test_extract_subdomain() {
        assert_eq!(
            extract_domain("local@sub.domain.tld").unwrap(),
            "sub.domain.tld"
        );
    }

    #[test]
    fn test_invalid_address_no_at() {
        assert!(Address::new("userexample.com").is_err());
    }

    #[test]
    fn test_invalid_address_two_at() {
        assert!(extract_domain("a@b@example.com").is_err());
    }

    #[test]
    fn test_invalid_address_empty() {
        assert!(Address::new("").is_err());
    }

    #[test]
    fn test_invalid_address_empty_local() {
        assert!(Address::new("@example.com").is_err());
    }

    #[test]
    fn test_invalid_address_empty_domain() {
        assert!(Address::new("user@").is_err());
    }

    #[test]
    fn test_invalid_address_whitespace() {
        assert!(extract_domain("us er@example.com").is_err());
        assert!(extract_domain("user@exa mple.com").is_err());
        assert!(extract_domain(" user@example.com").is_err());
    }

    #[test]
    fn test_invalid_single_label_domain() {
        assert!(extract_domain("user@localhost").is_err());
    }

    #[test]
    fn test_invalid_short_tld() {
        assert!(extract_domain("user@example.c").is_err());
    }

    #[test]
    fn test_invalid_empty_label() {
        assert!(extract_domain("user@example..com").is_err());
        assert!(extract_domain("user@.example.com").is_err());
        assert!(extract_domain("user@example.com.").is_err());
    }

    #[test]
    fn test_invalid_comma_in_domain() {
        assert!(extract_domain("user@exa,mple.com").is_err());
    }

    #[test]
    fn test_error_message() {
        let err = extract_domain("nope").unwrap_err();
        assert_eq!(err.to_string(), "invalid email address");
    }

    #[test]
    fn test_from_str() {
        let addr: Address = "john@mail.example.org".parse().unwrap();
        assert_eq!(addr.domain(), "mail.example.org");
    }

    proptest! {
        #[test]
        fn prop_extracts_domain(
            local in "[a-z0-9+_.-]{1,16}",
            labels in prop::collection::vec("[a-z0-9-]{1,10}", 1..4),
            tld in "[a-z]{2,6}",
        ) {
            let domain = format!("{}.{tld}", labels.join("."));
            let address = format!("{local}@{domain}");
            prop_assert_eq!(extract_domain(&address).unwrap(), domain.as_str());
        }

        #[test]
        fn prop_rejects_single_label(local in "[a-z]{1,8}", host in "[a-z]{1,12}") {
            let address = format!("{local}@{host}");
            prop_assert!(extract_domain(&address).is_err());
        }
    }
}
