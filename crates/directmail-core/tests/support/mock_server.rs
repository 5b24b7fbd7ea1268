//! Loopback SMTP server for delivery tests.
//!
//! Each accepted connection gets a scripted session: a 220 banner, canned
//! replies per command and a recorded transcript. When STARTTLS is offered
//! and requested, the server either performs a real handshake with the
//! configured acceptor and carries on over TLS, or, without one, answers 220
//! and writes plain text instead of a handshake.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

#[derive(Clone)]
struct Script {
    starttls: bool,
    tls: Option<TlsAcceptor>,
    silent: bool,
    mail_from_reply: String,
}

#[derive(Debug, Default)]
struct Record {
    commands: Mutex<Vec<String>>,
    messages: Mutex<Vec<Vec<u8>>>,
    connections: AtomicUsize,
}

/// How a plaintext or secured session ended.
enum Ended {
    Closed,
    StartTls,
}

/// Running mock server.
pub struct MockSmtpServer {
    addr: SocketAddr,
    record: Arc<Record>,
    task: JoinHandle<()>,
}

impl MockSmtpServer {
    pub fn builder() -> MockSmtpServerBuilder {
        MockSmtpServerBuilder {
            ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            script: Script {
                starttls: false,
                tls: None,
                silent: false,
                mail_from_reply: "250 2.1.0 Ok".to_string(),
            },
        }
    }

    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Command lines received, across all connections.
    pub fn commands(&self) -> Vec<String> {
        self.record.commands.lock().unwrap().clone()
    }

    /// Message bodies received, without the terminating dot line.
    pub fn messages(&self) -> Vec<Vec<u8>> {
        self.record.messages.lock().unwrap().clone()
    }

    pub fn connections(&self) -> usize {
        self.record.connections.load(Ordering::SeqCst)
    }
}

impl Drop for MockSmtpServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct MockSmtpServerBuilder {
    ip: IpAddr,
    port: u16,
    script: Script,
}

impl MockSmtpServerBuilder {
    pub fn bind(mut self, ip: IpAddr, port: u16) -> Self {
        self.ip = ip;
        self.port = port;
        self
    }

    /// Offers STARTTLS but answers it with plain text.
    pub fn with_starttls(mut self) -> Self {
        self.script.starttls = true;
        self
    }

    /// Offers STARTTLS and completes the handshake with `acceptor`.
    pub fn with_tls(mut self, acceptor: TlsAcceptor) -> Self {
        self.script.starttls = true;
        self.script.tls = Some(acceptor);
        self
    }

    /// Accepts connections and never writes a byte.
    pub fn silent(mut self) -> Self {
        self.script.silent = true;
        self
    }

    pub fn with_mail_from_reply(mut self, reply: &str) -> Self {
        self.script.mail_from_reply = reply.to_string();
        self
    }

    pub async fn start(self) -> std::io::Result<MockSmtpServer> {
        let listener = TcpListener::bind((self.ip, self.port)).await?;
        let addr = listener.local_addr()?;
        let record = Arc::new(Record::default());
        let script = Arc::new(self.script);

        let task = {
            let record = Arc::clone(&record);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    record.connections.fetch_add(1, Ordering::SeqCst);
                    let record = Arc::clone(&record);
                    let script = Arc::clone(&script);
                    tokio::spawn(async move {
                        let _ = serve(stream, &script, &record).await;
                    });
                }
            })
        };

        Ok(MockSmtpServer { addr, record, task })
    }
}

async fn serve(stream: TcpStream, script: &Script, record: &Record) -> std::io::Result<()> {
    if script.silent {
        let _held = stream;
        return std::future::pending().await;
    }

    let mut stream = BufReader::new(stream);
    stream.get_mut().write_all(b"220 mock ESMTP ready\r\n").await?;

    if let Ended::Closed = converse(&mut stream, script, record, false).await? {
        return Ok(());
    }

    let mut tcp = stream.into_inner();
    let Some(acceptor) = &script.tls else {
        tcp.write_all(b"this is not TLS\r\n").await?;
        return tcp.shutdown().await;
    };
    let tls = acceptor.accept(tcp).await?;
    let mut stream = BufReader::new(tls);
    converse(&mut stream, script, record, true).await?;
    Ok(())
}

async fn converse<S>(
    stream: &mut BufReader<S>,
    script: &Script,
    record: &Record,
    secured: bool,
) -> std::io::Result<Ended>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let offer_tls = script.starttls && !secured;
    let mut line = String::new();
    loop {
        line.clear();
        if stream.read_line(&mut line).await? == 0 {
            return Ok(Ended::Closed);
        }
        let command = line.trim_end().to_string();
        record.commands.lock().unwrap().push(command.clone());

        let verb = command
            .split([' ', ':'])
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();

        let reply = match verb.as_str() {
            "EHLO" if offer_tls => {
                "250-mock\r\n250-PIPELINING\r\n250 STARTTLS\r\n".to_string()
            }
            "EHLO" => "250-mock\r\n250 8BITMIME\r\n".to_string(),
            "HELO" => "250 mock\r\n".to_string(),
            "MAIL" => format!("{}\r\n", script.mail_from_reply),
            "RCPT" => "250 2.1.5 Ok\r\n".to_string(),
            "DATA" => {
                stream
                    .get_mut()
                    .write_all(b"354 End data with <CR><LF>.<CR><LF>\r\n")
                    .await?;
                let body = read_body(stream).await?;
                record.messages.lock().unwrap().push(body);
                "250 2.0.0 queued\r\n".to_string()
            }
            "STARTTLS" if offer_tls => {
                stream
                    .get_mut()
                    .write_all(b"220 2.0.0 Ready to start TLS\r\n")
                    .await?;
                return Ok(Ended::StartTls);
            }
            "QUIT" => {
                stream.get_mut().write_all(b"221 2.0.0 Bye\r\n").await?;
                stream.get_mut().shutdown().await?;
                return Ok(Ended::Closed);
            }
            _ => "502 5.5.2 Command not recognized\r\n".to_string(),
        };
        stream.get_mut().write_all(reply.as_bytes()).await?;
    }
}

async fn read_body<S>(stream: &mut BufReader<S>) -> std::io::Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut body = Vec::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        if stream.read_until(b'\n', &mut line).await? == 0 || line == b".\r\n" {
            return Ok(body);
        }
        body.extend_from_slice(&line);
    }
}
