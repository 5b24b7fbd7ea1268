//! Outbound buffers produced by the engine.

use crate::command::Command;

/// Bytes the session loop must write to the server, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmit {
    /// Wire bytes, CRLF-terminated.
    pub data: Vec<u8>,
}

impl Transmit {
    /// Wraps raw wire bytes.
    #[must_use]
    pub const fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Returns the bytes as text, if they are valid UTF-8.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}

impl From<&Command> for Transmit {
    fn from(cmd: &Command) -> Self {
        Self::new(cmd.serialize())
    }
}

impl AsRef<[u8]> for Transmit {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_bytes() {
        let t = Transmit::from(&Command::Data);
        assert_eq!(t.as_str(), Some("DATA\r\n"));
        assert_eq!(t.as_ref(), b"DATA\r\n");
    }

    #[test]
    fn test_binary_body_is_not_text() {
        let t = Transmit::new(vec![0xff, b'\r', b'\n']);
        assert_eq!(t.as_str(), None);
    }
}
