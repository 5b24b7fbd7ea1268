//! Client commands and their wire form.

use crate::types::Address;

/// A command the client can send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `HELO`, for servers that do not announce ESMTP.
    Helo {
        /// Name the client introduces itself with.
        hostname: String,
    },
    /// `EHLO`.
    Ehlo {
        /// Name the client introduces itself with.
        hostname: String,
    },
    /// `STARTTLS`.
    StartTls,
    /// `MAIL FROM:<sender>`.
    MailFrom {
        /// Envelope sender.
        from: Address,
    },
    /// `RCPT TO:<recipient>`.
    RcptTo {
        /// Envelope recipient.
        to: Address,
    },
    /// `DATA`.
    Data,
    /// `QUIT`.
    Quit,
}

impl Command {
    /// Returns the verb, as logged.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Helo { .. } => "HELO",
            Self::Ehlo { .. } => "EHLO",
            Self::StartTls => "STARTTLS",
            Self::MailFrom { .. } => "MAIL",
            Self::RcptTo { .. } => "RCPT",
            Self::Data => "DATA",
            Self::Quit => "QUIT",
        }
    }

    /// Encodes the command as one CRLF-terminated line.
    ///
    /// A command without an argument is written as `VERB\r\n`, one with an
    /// argument as `VERB argument\r\n`.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(self.verb().as_bytes());

        match self {
            Self::Helo { hostname } | Self::Ehlo { hostname } => {
                buf.push(b' ');
                buf.extend_from_slice(hostname.as_bytes());
            }
            Self::MailFrom { from } => {
                buf.extend_from_slice(b" FROM:<");
                buf.extend_from_slice(from.as_str().as_bytes());
                buf.push(b'>');
            }
            Self::RcptTo { to } => {
                buf.extend_from_slice(b" TO:<");
                buf.extend_from_slice(to.as_str().as_bytes());
                buf.push(b'>');
            }
            Self::StartTls | Self::Data | Self::Quit => {}
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    #[test]
    fn test_greetings() {
        let hostname = "relay.example.org".to_string();
        let helo = Command::Helo {
            hostname: hostname.clone(),
        };
        let ehlo = Command::Ehlo { hostname };
        assert_eq!(helo.serialize(), b"HELO relay.example.org\r\n");
        assert_eq!(ehlo.serialize(), b"EHLO relay.example.org\r\n");
    }

    #[test]
    fn test_envelope() {
        let from = Command::MailFrom {
            from: addr("alice@example.org"),
        };
        let to = Command::RcptTo {
            to: addr("bob@example.com"),
        };
        assert_eq!(from.serialize(), b"MAIL FROM:<alice@example.org>\r\n");
        assert_eq!(to.serialize(), b"RCPT TO:<bob@example.com>\r\n");
    }

    #[test]
    fn test_bare_verbs() {
        for (cmd, wire) in [
            (Command::StartTls, &b"STARTTLS\r\n"[..]),
            (Command::Data, &b"DATA\r\n"[..]),
            (Command::Quit, &b"QUIT\r\n"[..]),
        ] {
            assert_eq!(cmd.serialize(), wire);
        }
    }

    #[test]
    fn test_verbs() {
        assert_eq!(Command::Data.verb(), "DATA");
        let rcpt = Command::RcptTo {
            to: addr("a@example.com"),
        };
        assert_eq!(rcpt.verb(), "RCPT");
    }
}
