//! Session loop: pipes a stream into a [`Protocol`] and back.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_rustls::TlsConnector;

use super::{Timeouts, start_tls};
use crate::error::{Error, Result};
use crate::protocol::{Progress, Protocol, ProtocolConfig};

/// Default buffer size for reading.
const READ_BUFFER_SIZE: usize = 4096;

/// How a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The server closed the session (221 or end of stream).
    Completed,
    /// The server accepted STARTTLS; continue with [`upgrade_and_retry`].
    UpgradeRequired,
}

/// Runs one protocol instance over `stream` until it completes.
///
/// Commands produced by the protocol are written as soon as they are
/// available; each read and write is bounded by `response_timeout`. The
/// stream is left open: closing it is up to the caller.
///
/// # Errors
///
/// Returns protocol errors from the engine, I/O errors from the stream, and
/// [`Error::Timeout`] if the server stalls.
pub async fn run_session<S>(
    stream: &mut S,
    mut protocol: Protocol,
    response_timeout: Duration,
) -> Result<SessionOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    send_pending(stream, &mut protocol, response_timeout).await?;

    loop {
        let n = with_deadline(response_timeout, stream.read(&mut buf)).await?;
        if n == 0 {
            protocol.finish()?;
            return Ok(SessionOutcome::Completed);
        }

        let input = protocol.handle_input(&buf[..n]);
        let sent = send_pending(stream, &mut protocol, response_timeout).await;
        // Commands answered before a failing reply still go out.
        let progress = input?;
        sent?;

        match progress {
            Progress::Continue => {}
            Progress::Closed => {
                protocol.finish()?;
                return Ok(SessionOutcome::Completed);
            }
            Progress::UpgradeRequired => {
                tracing::debug!("server accepted STARTTLS");
                return Ok(SessionOutcome::UpgradeRequired);
            }
        }
    }
}

/// Negotiates TLS over `stream` and runs a second, secured session on it.
///
/// The new protocol greets first (`EHLO`) since the server does not repeat
/// its banner after the handshake. The TLS stream is shut down afterwards
/// whatever the result.
///
/// # Errors
///
/// Returns an error if the handshake fails or times out, or if the secured
/// session fails. There is no further fallback.
pub async fn upgrade_and_retry<S>(
    stream: S,
    connector: &TlsConnector,
    hostname: &str,
    config: &ProtocolConfig,
    timeouts: Timeouts,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut tls = tokio::time::timeout(
        timeouts.tls_handshake,
        start_tls(stream, connector, hostname),
    )
    .await
    .map_err(|_| Error::Timeout(timeouts.tls_handshake))??;
    tracing::debug!(hostname, "TLS established");

    let protocol = Protocol::new(config.upgraded());
    let result = run_session(&mut tls, protocol, timeouts.response).await;

    if let Err(e) = tls.shutdown().await {
        tracing::debug!(?e, "TLS shutdown failed");
    }

    match result? {
        SessionOutcome::Completed => Ok(()),
        SessionOutcome::UpgradeRequired => Err(Error::Protocol(
            "STARTTLS requested inside a TLS session".into(),
        )),
    }
}

async fn send_pending<S>(
    stream: &mut S,
    protocol: &mut Protocol,
    response_timeout: Duration,
) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    while let Some(transmit) = protocol.poll_transmit() {
        with_deadline(response_timeout, async {
            stream.write_all(&transmit.data).await?;
            stream.flush().await
        })
        .await?;
    }
    Ok(())
}

async fn with_deadline<T>(
    deadline: Duration,
    fut: impl Future<Output = std::io::Result<T>>,
) -> Result<T> {
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| Error::Timeout(deadline))?
        .map_err(Error::from)
}
