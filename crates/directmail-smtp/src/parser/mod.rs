//! SMTP response parser.
//!
//! Replies are CRLF-terminated lines of the form `NNN<sep>text`, where the
//! separator is `-` on continuation lines and a space on the last line:
//!
//! ```text
//! 250-mail.example.com
//! 250-PIPELINING
//! 250 STARTTLS
//! ```

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// A single parsed reply line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyLine<'a> {
    /// Reply code.
    pub code: ReplyCode,
    /// Whether this line ends its reply (space separator).
    pub last: bool,
    /// Text after the separator.
    pub text: &'a str,
}

/// Parses one reply line (without its CRLF).
///
/// # Errors
///
/// Returns [`Error::MalformedResponse`] if the line is too short, the code
/// is not three digits, or the separator is neither space nor `-`.
pub fn parse_line(line: &str) -> Result<ReplyLine<'_>> {
    let bytes = line.as_bytes();
    if bytes.len() < 4 || !bytes[..3].iter().all(u8::is_ascii_digit) {
        return Err(Error::MalformedResponse(line.to_string()));
    }

    let last = match bytes[3] {
        b' ' => true,
        b'-' => false,
        _ => return Err(Error::MalformedResponse(line.to_string())),
    };

    let code = bytes[..3]
        .iter()
        .fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0'));

    Ok(ReplyLine {
        code: ReplyCode::new(code),
        last,
        text: &line[4..],
    })
}

/// Groups reply lines into complete [`Reply`] values.
#[derive(Debug, Default)]
pub struct ReplyAssembler {
    pending: Option<Reply>,
}

impl ReplyAssembler {
    /// Creates an empty assembler.
    #[must_use]
    pub const fn new() -> Self {
        Self { pending: None }
    }

    /// Feeds one line; returns the reply once its last line arrives.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] if the line cannot be parsed or
    /// its code differs from the first line of the reply in progress.
    pub fn push(&mut self, line: &str) -> Result<Option<Reply>> {
        let parsed = parse_line(line)?;

        let reply = match self.pending.take() {
            Some(mut reply) => {
                if reply.code != parsed.code {
                    return Err(Error::MalformedResponse(line.to_string()));
                }
                reply.message.push(parsed.text.to_string());
                reply
            }
            None => Reply::new(parsed.code, vec![parsed.text.to_string()]),
        };

        if parsed.last {
            Ok(Some(reply))
        } else {
            self.pending = Some(reply);
            Ok(None)
        }
    }

    /// Returns true if a multi-line reply is partially assembled.
    #[must_use]
    pub const fn in_progress(&self) -> bool {
        self.pending.is_some()
    }
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

    #[test]
    fn test_parse_single_line() {
        let line = parse_line("250 OK").unwrap();
        assert_eq!(line.code.as_u16(), 250);
        assert!(line.last);
        assert_eq!(line.text, "OK");
    }

    #[test]
    fn test_parse_continuation_line() {
        let line = parse_line("250-PIPELINING").unwrap();
        assert!(!line.last);
        assert_eq!(line.text, "PIPELINING");
    }

    #[test]
    fn test_parse_empty_text() {
        let line = parse_line("250 ").unwrap();
        assert_eq!(line.text, "");
    }

    #[test]
    fn test_parse_error_too_short() {
        assert!(matches!(
            parse_line("250"),
            Err(Error::MalformedResponse(_))
        ));
        assert!(parse_line("25").is_err());
    }

    #[test]
    fn test_parse_error_bad_separator() {
        assert!(matches!(
            parse_line("250+OK"),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_error_invalid_code() {
        assert!(matches!(
            parse_line("ABC OK"),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_assemble_multi_line() {
        let mut asm = ReplyAssembler::new();
        assert!(asm.push("250-mail.example.com").unwrap().is_none());
        assert!(asm.in_progress());
        assert!(asm.push("250-SIZE 1000").unwrap().is_none());
        let reply = asm.push("250 STARTTLS").unwrap().unwrap();
        assert!(!asm.in_progress());
        assert_eq!(reply.code, ReplyCode::OK);
        assert_eq!(
            reply.message,
            vec!["mail.example.com", "SIZE 1000", "STARTTLS"]
        );
    }

    #[test]
    fn test_assemble_code_mismatch() {
        let mut asm = ReplyAssembler::new();
        asm.push("250-abc").unwrap();
        let err = asm.push("251 def").unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(line) if line == "251 def"));
    }

    #[test]
    fn test_assemble_back_to_back() {
        let mut asm = ReplyAssembler::new();
        let first = asm.push("220 ready").unwrap().unwrap();
        let second = asm.push("250 OK").unwrap().unwrap();
        assert_eq!(first.code, ReplyCode::SERVICE_READY);
        assert_eq!(second.code, ReplyCode::OK);
    }
}
