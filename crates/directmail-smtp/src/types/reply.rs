//! SMTP reply types.

/// One complete server reply.
///
/// Continuation lines are kept in order, one entry each; every line of a
/// reply carries the same code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Reply message lines.
    pub message: Vec<String>,
}

impl Reply {
    /// Builds a reply from its code and text lines.
    #[must_use]
    pub const fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Returns the full message, lines joined with CRLF.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\r\n")
    }

    /// Returns true if any line of the reply contains `word` as a whole
    /// word, compared ASCII case-insensitively.
    #[must_use]
    pub fn mentions(&self, word: &str) -> bool {
        self.message.iter().any(|line| contains_word(line, word))
    }
}

/// Three-digit reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns the class digit: 2 positive, 3 intermediate, 4 transient
    /// failure, 5 permanent failure.
    #[must_use]
    pub const fn class(self) -> u16 {
        self.0 / 100
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ReplyCode {
    /// 220, greeting or go-ahead for TLS.
    pub const SERVICE_READY: Self = Self(220);
    /// 221, server is closing the channel.
    pub const CLOSING: Self = Self(221);
    /// 250, action completed.
    pub const OK: Self = Self(250);
    /// 251, recipient not local, will forward.
    pub const FORWARD: Self = Self(251);
    /// 354, send the message body.
    pub const START_DATA: Self = Self(354);
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Whole-word, ASCII case-insensitive search (`\bword\b`).
pub(crate) fn contains_word(haystack: &str, word: &str) -> bool {
    let hay = haystack.as_bytes();
    let needle = word.as_bytes();
    if needle.is_empty() || hay.len() < needle.len() {
        return false;
    }

    (0..=hay.len() - needle.len()).any(|start| {
        let end = start + needle.len();
        hay[start..end].eq_ignore_ascii_case(needle)
            && (start == 0 || !is_word_byte(hay[start - 1]))
            && (end == hay.len() || !is_word_byte(hay[end]))
    })
}
