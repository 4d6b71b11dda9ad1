//! Minimal inbound SMTP receiver.
//!
//! Accepts HELO/EHLO, MAIL FROM, RCPT TO, DATA, RSET, NOOP, and QUIT, and
//! hands each completed transaction to the intake pipeline. Recipient
//! validation happens at `RCPT TO` time so unknown mailboxes are refused
//! before the client transmits any content.

use std::io;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::config::ReceiverConfig;
use crate::intake::{Envelope, Intake, IntakeError};

/// Errors that terminate a listener or an individual session.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    #[error("connection error: {0}")]
    Io(#[from] io::Error),

    #[error("session idle timeout expired")]
    IdleTimeout,
}

/// The inbound SMTP listener.
pub struct SmtpReceiver {
    config: ReceiverConfig,
    intake: Intake,
}

impl SmtpReceiver {
    #[must_use]
    pub const fn new(config: ReceiverConfig, intake: Intake) -> Self {
        Self { config, intake }
    }

    /// Binds the configured listen address and serves sessions until
    /// `ctrl_c`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] when the listen address cannot be
    /// bound. Per-session errors are logged, not propagated.
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        self.serve(listener).await
    }

    /// Serves sessions on an already-bound listener until `ctrl_c`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] when accepting a connection fails.
    /// Per-session errors are logged, not propagated.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "inbound SMTP listener started");
        }

        let receiver = Arc::new(self);
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = accepted?;
                    debug!(%peer, "accepted connection");

                    let receiver = receiver.clone();
                    tokio::spawn(async move {
                        if let Err(err) = receiver.serve_session(stream).await {
                            warn!(%peer, error = %err, "session ended with error");
                        }
                    });
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received, stopping listener");
                    return Ok(());
                }
            }
        }
    }

    /// Runs one client session to completion.
    async fn serve_session(&self, stream: TcpStream) -> Result<(), ServerError> {
        let (read_half, write_half) = stream.into_split();
        let mut session = Session {
            reader: BufReader::new(read_half),
            writer: write_half,
            config: &self.config,
            intake: &self.intake,
            mail_from: None,
            rcpt_to: Vec::new(),
        };
        session.run().await
    }
}

/// Per-connection protocol state.
struct Session<'a> {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    config: &'a ReceiverConfig,
    intake: &'a Intake,
    mail_from: Option<String>,
    rcpt_to: Vec<String>,
}

impl Session<'_> {
    async fn run(&mut self) -> Result<(), ServerError> {
        self.reply(&format!("220 {} ESMTP service ready", self.config.hostname))
            .await?;

        loop {
            let Some(line) = self.read_command().await? else {
                // Client hung up without QUIT.
                return Ok(());
            };

            let (verb, argument) = split_verb(&line);

            match verb.as_str() {
                "HELO" | "EHLO" => {
                    self.reply(&format!("250 {}", self.config.hostname)).await?;
                }
                "MAIL" => self.handle_mail(argument).await?,
                "RCPT" => self.handle_rcpt(argument).await?,
                "DATA" => self.handle_data().await?,
                "RSET" => {
                    self.reset();
                    self.reply("250 OK").await?;
                }
                "NOOP" => self.reply("250 OK").await?,
                "QUIT" => {
                    self.reply(&format!("221 {} closing connection", self.config.hostname))
                        .await?;
                    return Ok(());
                }
                _ => self.reply("502 command not implemented").await?,
            }
        }
    }

    async fn handle_mail(&mut self, argument: &str) -> Result<(), ServerError> {
        match parse_path(argument, "FROM:") {
            Some(sender) => {
                self.reset();
                self.mail_from = Some(sender);
                self.reply("250 OK").await
            }
            None => self.reply("501 syntax: MAIL FROM:<address>").await,
        }
    }

    async fn handle_rcpt(&mut self, argument: &str) -> Result<(), ServerError> {
        if self.mail_from.is_none() {
            return self.reply("503 need MAIL FROM first").await;
        }

        let Some(recipient) = parse_path(argument, "TO:") else {
            return self.reply("501 syntax: RCPT TO:<address>").await;
        };

        match self.intake.is_deliverable(&recipient).await {
            Ok(true) => {
                self.rcpt_to.push(recipient);
                self.reply("250 OK").await
            }
            Ok(false) => self.reply("550 user unknown").await,
            Err(err) => {
                error!(recipient, error = %err, "recipient lookup failed");
                self.reply("451 unable to verify recipient, try again later")
                    .await
            }
        }
    }

    async fn handle_data(&mut self) -> Result<(), ServerError> {
        let Some(mail_from) = self.mail_from.clone() else {
            return self.reply("503 need MAIL FROM first").await;
        };
        if self.rcpt_to.is_empty() {
            return self.reply("503 need RCPT TO first").await;
        }

        self.reply("354 end data with <CRLF>.<CRLF>").await?;

        let raw = match self.read_data().await? {
            Some(raw) => raw,
            None => {
                self.reset();
                return self
                    .reply("552 message exceeds maximum allowed size")
                    .await;
            }
        };

        let envelope = Envelope {
            mail_from,
            rcpt_to: std::mem::take(&mut self.rcpt_to),
        };
        self.mail_from = None;

        match self.intake.accept(&envelope, &raw).await {
            Ok(receipt) => {
                if receipt.is_partial() {
                    debug!(
                        rejected = receipt.rejected.len(),
                        "stored with some recipients rejected"
                    );
                }
                self.reply("250 OK message accepted for delivery").await
            }
            Err(IntakeError::NoValidRecipients) => {
                self.reply("550 no valid recipients").await
            }
            Err(err) => {
                error!(error = %err, "intake failed");
                self.reply("451 local error in processing").await
            }
        }
    }

    /// Reads the DATA payload up to the `.` terminator, reversing
    /// dot-stuffing. Returns `None` when the payload exceeds the configured
    /// size cap (the remainder is still drained so the session can go on).
    async fn read_data(&mut self) -> Result<Option<Vec<u8>>, ServerError> {
        let mut raw: Vec<u8> = Vec::new();
        let mut oversized = false;

        loop {
            let Some(line) = self.read_line().await? else {
                return Err(ServerError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed during DATA",
                )));
            };

            if line == "." {
                break;
            }

            let content = line.strip_prefix('.').unwrap_or(&line);
            if raw.len() + content.len() + 2 > self.config.max_message_bytes {
                oversized = true;
                continue;
            }
            raw.extend_from_slice(content.as_bytes());
            raw.extend_from_slice(b"\r\n");
        }

        Ok(if oversized { None } else { Some(raw) })
    }

    async fn read_command(&mut self) -> Result<Option<String>, ServerError> {
        self.read_line().await
    }

    /// Reads one CRLF-terminated line under the session idle timeout.
    /// `None` means the client closed the connection.
    async fn read_line(&mut self) -> Result<Option<String>, ServerError> {
        let mut line = String::new();
        let read = tokio::time::timeout(
            self.config.command_timeout(),
            self.reader.read_line(&mut line),
        )
        .await
        .map_err(|_| ServerError::IdleTimeout)??;

        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    async fn reply(&mut self, line: &str) -> Result<(), ServerError> {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await?;
        Ok(())
    }

    fn reset(&mut self) {
        self.mail_from = None;
        self.rcpt_to.clear();
    }
}

fn split_verb(line: &str) -> (String, &str) {
    match line.split_once(' ') {
        Some((verb, rest)) => (verb.to_ascii_uppercase(), rest.trim()),
        None => (line.trim().to_ascii_uppercase(), ""),
    }
}

/// Extracts the address from a `FROM:<addr>` / `TO:<addr>` argument,
/// tolerating a space after the colon and missing angle brackets.
fn parse_path(argument: &str, keyword: &str) -> Option<String> {
    let upper = argument.to_ascii_uppercase();
    if !upper.starts_with(keyword) {
        return None;
    }

    let path = argument[keyword.len()..].trim();
    let path = path
        .strip_prefix('<')
        .and_then(|p| p.strip_suffix('>'))
        .unwrap_or(path);

    // An empty MAIL FROM:<> is a legal null reverse-path.
    Some(path.to_string())
}
