//! Sans-I/O SMTP client protocol.
//!
//! The engine parses server replies and decides which command comes next.
//! It never touches a socket and has no notion of time:
//!
//! - Feed received bytes via `handle_input()`
//! - Drain bytes to send via `poll_transmit()`
//! - Call `finish()` when the peer closes the stream
//!
//! One command is in flight at a time; the next one is produced only after
//! the previous reply has been fully parsed.
//!
//! # Example
//!
//! ```
//! use directmail_smtp::protocol::{Progress, Protocol, ProtocolConfig};
//! use directmail_smtp::Address;
//!
//! let config = ProtocolConfig::new(
//!     "example.org",
//!     Address::new("alice@example.org").unwrap(),
//!     Address::new("bob@example.com").unwrap(),
//!     b"Subject: hi\r\n\r\nhello\r\n".to_vec(),
//! );
//! let mut protocol = Protocol::new(config);
//!
//! let progress = protocol.handle_input(b"220 mx.example.com ESMTP\r\n").unwrap();
//! assert_eq!(progress, Progress::Continue);
//! let transmit = protocol.poll_transmit().unwrap();
//! assert_eq!(transmit.as_str(), Some("EHLO example.org\r\n"));
//! ```

#![allow(clippy::missing_const_for_fn)]

mod transmit;

use std::collections::VecDeque;

use bytes::{Buf, Bytes, BytesMut};

pub use transmit::Transmit;

/// Longest reply line accepted, CRLF excluded. RFC 5321 asks for 512.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

use crate::command::Command;
use crate::parser::ReplyAssembler;
use crate::types::{Address, Reply, ReplyCode};
use crate::{Error, Result};

/// Parameters for one protocol run.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Argument of HELO/EHLO.
    pub sender_host: String,
    /// Envelope sender.
    pub sender: Address,
    /// Envelope recipient.
    pub recipient: Address,
    /// Finished message, sent verbatim after DATA.
    pub body: Bytes,
    /// The channel is already TLS-protected; STARTTLS is never attempted.
    pub secured: bool,
    /// Send EHLO immediately instead of waiting for a 220 greeting.
    pub pre_greet: bool,
}

impl ProtocolConfig {
    /// Creates a configuration for a plaintext session that waits for the
    /// server greeting.
    #[must_use]
    pub fn new(
        sender_host: impl Into<String>,
        sender: Address,
        recipient: Address,
        body: impl Into<Bytes>,
    ) -> Self {
        Self {
            sender_host: sender_host.into(),
            sender,
            recipient,
            body: body.into(),
            secured: false,
            pre_greet: false,
        }
    }

    /// Returns the configuration for resuming inside a freshly negotiated
    /// TLS channel: secured, and greeting the server first.
    #[must_use]
    pub fn upgraded(&self) -> Self {
        Self {
            secured: true,
            pre_greet: true,
            ..self.clone()
        }
    }
}

/// Result of feeding input to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// More input is expected.
    Continue,
    /// The server said goodbye (221).
    Closed,
    /// The server accepted STARTTLS; the caller must negotiate TLS on the
    /// same connection and continue with a new engine.
    UpgradeRequired,
}

/// Sans-I/O SMTP client state machine.
#[derive(Debug)]
pub struct Protocol {
    /// Argument of HELO/EHLO.
    sender_host: String,
    /// Message body for the DATA phase.
    body: Bytes,
    /// Running inside TLS already.
    secured: bool,
    /// Server advertised STARTTLS in a 250 reply.
    starttls_advertised: bool,
    /// Remaining envelope commands, consumed one per positive reply.
    pending: VecDeque<Command>,
    /// Outbound data queue.
    outbound: VecDeque<Transmit>,
    /// Received bytes that do not yet form a complete line.
    inbound: BytesMut,
    /// Prefix of `inbound` already searched for CRLF.
    scanned: usize,
    /// Multi-line reply grouping.
    assembler: ReplyAssembler,
    /// Terminal progress, once reached.
    done: Option<Progress>,
}

impl Protocol {
    /// Creates a new engine.
    ///
    /// With `pre_greet` set, `EHLO` is queued right away.
    #[must_use]
    pub fn new(config: ProtocolConfig) -> Self {
        let pending = VecDeque::from([
            Command::MailFrom {
                from: config.sender,
            },
            Command::RcptTo {
                to: config.recipient,
            },
            Command::Data,
            Command::Quit,
        ]);

        let mut protocol = Self {
            sender_host: config.sender_host,
            body: config.body,
            secured: config.secured,
            starttls_advertised: false,
            pending,
            outbound: VecDeque::new(),
            inbound: BytesMut::new(),
            scanned: 0,
            assembler: ReplyAssembler::new(),
            done: None,
        };

        if config.pre_greet {
            let hostname = protocol.sender_host.clone();
            protocol.send(&Command::Ehlo { hostname });
        }

        protocol
    }

    /// Returns true if the engine runs inside a TLS channel.
    #[must_use]
    pub fn is_secured(&self) -> bool {
        self.secured
    }

    /// Returns true once the server has advertised STARTTLS.
    #[must_use]
    pub fn starttls_advertised(&self) -> bool {
        self.starttls_advertised
    }

    /// Returns true once the server has closed the session with 221.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.done == Some(Progress::Closed)
    }

    /// Returns the next data to transmit, if any.
    pub fn poll_transmit(&mut self) -> Option<Transmit> {
        self.outbound.pop_front()
    }

    /// Feeds received data into the engine.
    ///
    /// Complete lines are processed in order; a trailing partial line is
    /// kept for the next call. Once a terminal [`Progress`] is reached,
    /// further input is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] for framing violations,
    /// including lines longer than [`MAX_LINE_LENGTH`], and
    /// [`Error::UnexpectedResponse`] for reply codes the client does not
    /// handle. Commands queued for replies preceding the failing one stay
    /// available through [`poll_transmit`](Self::poll_transmit).
    pub fn handle_input(&mut self, data: &[u8]) -> Result<Progress> {
        if let Some(progress) = self.done {
            return Ok(progress);
        }

        self.inbound.extend_from_slice(data);

        while let Some(pos) = self.next_line_end() {
            if pos > MAX_LINE_LENGTH {
                return Err(line_too_long());
            }
            let line = self.inbound.split_to(pos + 2);
            let line = String::from_utf8_lossy(&line[..pos]);

            let Some(reply) = self.assembler.push(&line)? else {
                continue;
            };

            let progress = self.respond(&reply)?;
            if progress != Progress::Continue {
                // Complete lines after a terminal reply are dropped; a
                // trailing partial line stays for `finish()` to report.
                if let Some(last) = rfind_crlf(&self.inbound) {
                    self.inbound.advance(last + 2);
                }
                self.scanned = 0;
                self.done = Some(progress);
                return Ok(progress);
            }
        }

        if self.inbound.len() > MAX_LINE_LENGTH {
            return Err(line_too_long());
        }
        Ok(Progress::Continue)
    }

    /// Finds the next CRLF, resuming where the previous search stopped.
    fn next_line_end(&mut self) -> Option<usize> {
        // A CR at the end of the scanned prefix may pair with a new LF.
        let start = self.scanned.saturating_sub(1);
        if let Some(pos) = find_crlf(&self.inbound[start..]) {
            self.scanned = 0;
            Some(start + pos)
        } else {
            self.scanned = self.inbound.len();
            None
        }
    }

    /// Signals that the peer closed its side of the stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompleteResponse`] if a partial line or an
    /// unterminated multi-line reply is still buffered.
    pub fn finish(&mut self) -> Result<()> {
        if !self.inbound.is_empty() {
            let leftover = String::from_utf8_lossy(&self.inbound).into_owned();
            return Err(Error::IncompleteResponse(leftover));
        }
        if self.assembler.in_progress() {
            return Err(Error::IncompleteResponse(String::new()));
        }
        Ok(())
    }

    fn respond(&mut self, reply: &Reply) -> Result<Progress> {
        tracing::debug!(code = %reply.code, "SMTP reply");

        match reply.code {
            ReplyCode::SERVICE_READY => {
                if !self.secured && self.starttls_advertised {
                    return Ok(Progress::UpgradeRequired);
                }
                let hostname = self.sender_host.clone();
                let cmd = if reply.mentions("esmtp") {
                    Command::Ehlo { hostname }
                } else {
                    Command::Helo { hostname }
                };
                self.send(&cmd);
            }
            ReplyCode::CLOSING => return Ok(Progress::Closed),
            ReplyCode::OK if !self.secured && reply.mentions("STARTTLS") => {
                self.starttls_advertised = true;
                self.send(&Command::StartTls);
            }
            ReplyCode::OK | ReplyCode::FORWARD => {
                let cmd = self.pending.pop_front().unwrap_or(Command::Quit);
                self.send(&cmd);
            }
            ReplyCode::START_DATA => self.send_body(),
            code => return Err(Error::unexpected(code.as_u16(), reply.message_text())),
        }

        Ok(Progress::Continue)
    }

    fn send(&mut self, cmd: &Command) {
        tracing::debug!(command = cmd.verb(), "SMTP command");
        self.outbound.push_back(Transmit::from(cmd));
    }

    fn send_body(&mut self) {
        let mut data = Vec::with_capacity(self.body.len() + 5);
        data.extend_from_slice(&self.body);
        if !data.is_empty() && !data.ends_with(b"\r\n") {
            data.extend_from_slice(b"\r\n");
        }
        data.extend_from_slice(b".\r\n");
        self.outbound.push_back(Transmit::new(data));
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn line_too_long() -> Error {
    Error::MalformedResponse(format!("reply line longer than {MAX_LINE_LENGTH} bytes"))
}

fn rfind_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).rposition(|w| w == b"\r\n")
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

    const BODY: &[u8] = b"Subject: test\r\n\r\nhello\r\n";

    fn config() -> ProtocolConfig {
        ProtocolConfig::new(
            "sender.example",
            Address::new("alice@sender.example").unwrap(),
            Address::new("bob@example.com").unwrap(),
            BODY.to_vec(),
        )
    }

    fn drain(protocol: &mut Protocol) -> Vec<String> {
        std::iter::from_fn(|| protocol.poll_transmit())
            .map(|t| String::from_utf8(t.data).unwrap())
            .collect()
    }

    #[test]
    fn test_esmtp_greeting_sends_ehlo() {
        let mut p = Protocol::new(config());
        let progress = p.handle_input(b"220 mail.example.com ESMTP ready\r\n").unwrap();
        assert_eq!(progress, Progress::Continue);
        assert_eq!(drain(&mut p), vec!["EHLO sender.example\r\n"]);
    }

    #[test]
    fn test_plain_greeting_sends_helo() {
        let mut p = Protocol::new(config());
        p.handle_input(b"220 mail.example.com ready\r\n").unwrap();
        assert_eq!(drain(&mut p), vec!["HELO sender.example\r\n"]);
    }

    #[test]
    fn test_esmtp_needs_word_boundary() {
        let mut p = Protocol::new(config());
        p.handle_input(b"220 mail.example.com XESMTPX ready\r\n").unwrap();
        assert_eq!(drain(&mut p), vec!["HELO sender.example\r\n"]);
    }

    #[test]
    fn test_starttls_advertised() {
        let mut p = Protocol::new(config());
        p.handle_input(b"220 mail.example.com ESMTP\r\n").unwrap();
        drain(&mut p);

        p.handle_input(b"250-mail.example.com\r\n250 STARTTLS\r\n")
            .unwrap();
        assert!(p.starttls_advertised());
        assert_eq!(drain(&mut p), vec!["STARTTLS\r\n"]);
    }

    #[test]
    fn test_ready_after_starttls_requires_upgrade() {
        let mut p = Protocol::new(config());
        p.handle_input(b"220 mail.example.com ESMTP\r\n").unwrap();
        p.handle_input(b"250-mail.example.com\r\n250 STARTTLS\r\n")
            .unwrap();
        drain(&mut p);

        let progress = p.handle_input(b"220 ready for TLS\r\n").unwrap();
        assert_eq!(progress, Progress::UpgradeRequired);
        assert!(drain(&mut p).is_empty());

        // Terminal: later input is ignored.
        assert_eq!(
            p.handle_input(b"250 OK\r\n").unwrap(),
            Progress::UpgradeRequired
        );
        assert!(drain(&mut p).is_empty());
    }

    #[test]
    fn test_secured_ignores_starttls() {
        let mut p = Protocol::new(config().upgraded());
        assert!(p.is_secured());
        assert_eq!(drain(&mut p), vec!["EHLO sender.example\r\n"]);

        p.handle_input(b"250-mail.example.com\r\n250 STARTTLS\r\n")
            .unwrap();
        assert!(!p.starttls_advertised());
        assert_eq!(
            drain(&mut p),
            vec!["MAIL FROM:<alice@sender.example>\r\n"]
        );
    }

    #[test]
    fn test_pre_greet_without_secured() {
        let cfg = ProtocolConfig {
            pre_greet: true,
            ..config()
        };
        let mut p = Protocol::new(cfg);
        assert!(!p.is_secured());
        assert_eq!(drain(&mut p), vec!["EHLO sender.example\r\n"]);
    }

    #[test]
    fn test_plain_happy_path() {
        let mut p = Protocol::new(config());
        let script: [&[u8]; 6] = [
            b"220 mail.example.com ready\r\n",
            b"250 hello\r\n",
            b"250 sender ok\r\n",
            b"250 recipient ok\r\n",
            b"354 go ahead\r\n",
            b"250 queued\r\n",
        ];

        let mut sent = Vec::new();
        for reply in script {
            assert_eq!(p.handle_input(reply).unwrap(), Progress::Continue);
            sent.extend(drain(&mut p));
        }

        assert_eq!(
            sent,
            vec![
                "HELO sender.example\r\n".to_string(),
                "MAIL FROM:<alice@sender.example>\r\n".to_string(),
                "RCPT TO:<bob@example.com>\r\n".to_string(),
                "DATA\r\n".to_string(),
                "Subject: test\r\n\r\nhello\r\n.\r\n".to_string(),
                "QUIT\r\n".to_string(),
            ]
        );

        assert_eq!(p.handle_input(b"221 bye\r\n").unwrap(), Progress::Closed);
        assert!(p.is_closed());
        assert!(drain(&mut p).is_empty());
        assert!(p.finish().is_ok());
    }

    #[test]
    fn test_forward_reply_dequeues() {
        let mut p = Protocol::new(config());
        p.handle_input(b"220 ready\r\n250 hi\r\n250 ok\r\n251 will forward\r\n")
            .unwrap();
        let sent = drain(&mut p);
        assert_eq!(sent.last().unwrap(), "DATA\r\n");
    }

    #[test]
    fn test_exhausted_queue_defaults_to_quit() {
        let mut p = Protocol::new(config());
        p.handle_input(b"220 ready\r\n").unwrap();
        for _ in 0..6 {
            p.handle_input(b"250 ok\r\n").unwrap();
        }
        let sent = drain(&mut p);
        assert_eq!(&sent[sent.len() - 3..], ["QUIT\r\n", "QUIT\r\n", "QUIT\r\n"]);
    }

    #[test]
    fn test_body_without_trailing_crlf() {
        let cfg = ProtocolConfig {
            body: Bytes::from_static(b"hello"),
            ..config()
        };
        let mut p = Protocol::new(cfg);
        p.handle_input(b"354 go\r\n").unwrap();
        assert_eq!(drain(&mut p), vec!["hello\r\n.\r\n"]);
    }

    #[test]
    fn test_mismatched_continuation_code() {
        let mut p = Protocol::new(config());
        let err = p.handle_input(b"250-abc\r\n251 def\r\n").unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[test]
    fn test_bad_separator() {
        let mut p = Protocol::new(config());
        let err = p.handle_input(b"220_ready\r\n").unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[test]
    fn test_unknown_code() {
        let mut p = Protocol::new(config());
        let err = p.handle_input(b"500 error\r\n").unwrap_err();
        assert_eq!(err.reply_code(), Some(500));
        assert!(matches!(
            err,
            Error::UnexpectedResponse { code: 500, ref message } if message == "error"
        ));
    }

    #[test]
    fn test_partial_line_is_incomplete() {
        let mut p = Protocol::new(config());
        assert_eq!(p.handle_input(b"220 ready").unwrap(), Progress::Continue);
        assert!(drain(&mut p).is_empty());
        let err = p.finish().unwrap_err();
        assert!(matches!(err, Error::IncompleteResponse(ref s) if s == "220 ready"));
    }

    #[test]
    fn test_unterminated_group_is_incomplete() {
        let mut p = Protocol::new(config());
        p.handle_input(b"250-first\r\n").unwrap();
        assert!(matches!(p.finish(), Err(Error::IncompleteResponse(_))));
    }

    #[test]
    fn test_empty_input_finishes_cleanly() {
        let mut p = Protocol::new(config());
        assert!(p.finish().is_ok());
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut p = Protocol::new(config());
        p.handle_input(b"220 mail.exa").unwrap();
        assert!(drain(&mut p).is_empty());
        p.handle_input(b"mple.com ESMTP\r").unwrap();
        assert!(drain(&mut p).is_empty());
        p.handle_input(b"\n").unwrap();
        assert_eq!(drain(&mut p), vec!["EHLO sender.example\r\n"]);
    }

    #[test]
    fn test_group_split_across_chunks() {
        let mut p = Protocol::new(config());
        p.handle_input(b"220 ESMTP\r\n250-mail.example.com\r\n").unwrap();
        assert_eq!(drain(&mut p), vec!["EHLO sender.example\r\n"]);
        p.handle_input(b"250 STARTTLS\r\n").unwrap();
        assert_eq!(drain(&mut p), vec!["STARTTLS\r\n"]);
    }

    #[test]
    fn test_overlong_line_is_rejected() {
        let mut p = Protocol::new(config());
        let chunk = vec![b'x'; 4096];
        let mut result = Ok(Progress::Continue);
        for _ in 0..=MAX_LINE_LENGTH / chunk.len() {
            result = p.handle_input(&chunk);
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(result, Err(Error::MalformedResponse(_))));
        assert!(p.inbound.len() <= MAX_LINE_LENGTH + chunk.len());
    }

    #[test]
    fn test_overlong_terminated_line_is_rejected() {
        let mut p = Protocol::new(config());
        let mut data = b"220 ".to_vec();
        data.resize(MAX_LINE_LENGTH + 10, b'x');
        data.extend_from_slice(b"\r\n");
        assert!(matches!(
            p.handle_input(&data),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_crlf_split_after_long_partial() {
        let mut p = Protocol::new(config());
        let mut data = b"220 mx.example.com ESMTP ".to_vec();
        data.resize(2000, b'x');
        data.push(b'\r');
        assert_eq!(p.handle_input(&data).unwrap(), Progress::Continue);
        assert!(p.poll_transmit().is_none());
        assert_eq!(p.handle_input(b"\n").unwrap(), Progress::Continue);
        assert_eq!(
            p.poll_transmit().unwrap().as_str(),
            Some("EHLO sender.example\r\n")
        );
    }

    #[test]
    fn test_commands_before_failure_stay_queued() {
        let mut p = Protocol::new(config());
        let err = p
            .handle_input(b"220 mx ready\r\n250 hi\r\n550 no\r\n")
            .unwrap_err();
        assert_eq!(err.reply_code(), Some(550));
        assert_eq!(
            drain(&mut p),
            vec!["HELO sender.example\r\n", "MAIL FROM:<alice@sender.example>\r\n"]
        );
    }

    #[test]
    fn test_lines_after_goodbye_are_ignored() {
        let mut p = Protocol::new(config());
        let progress = p.handle_input(b"221 bye\r\n250 stray\r\n").unwrap();
        assert_eq!(progress, Progress::Closed);
        assert!(drain(&mut p).is_empty());
        assert!(p.finish().is_ok());
    }
}
