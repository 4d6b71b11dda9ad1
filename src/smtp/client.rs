//! Line-level SMTP client over a plain TCP connection.
//!
//! Each delivery attempt opens its own connection and closes it when done;
//! there is no pooling. Timeouts are applied by the caller around each
//! command, so this type stays a straight request/reply pump.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use super::response::{Response, ResponseLine, ResponseParseError};

/// Errors from the SMTP client conversation.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Io(#[from] io::Error),

    #[error("connection closed by server")]
    ConnectionClosed,

    #[error("malformed server reply: {0}")]
    Parse(#[from] ResponseParseError),

    #[error("status code mismatch in multi-line reply: expected {expected}, got {got}")]
    CodeMismatch { expected: u16, got: u16 },
}

/// An open SMTP client connection.
pub struct SmtpClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl SmtpClient {
    /// Connects to `addr` (a `host:port` dial target).
    ///
    /// # Errors
    ///
    /// Returns the connect error; the caller bounds this with its connect
    /// timeout.
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        })
    }

    /// Reads the server's 220 greeting.
    ///
    /// # Errors
    ///
    /// Returns an error when reading or parsing fails.
    pub async fn read_greeting(&mut self) -> Result<Response, ClientError> {
        self.read_response().await
    }

    /// Sends one command line and reads the complete reply.
    ///
    /// # Errors
    ///
    /// Returns an error when writing, reading, or parsing fails.
    pub async fn command(&mut self, command: &str) -> Result<Response, ClientError> {
        self.writer
            .write_all(format!("{command}\r\n").as_bytes())
            .await?;
        self.read_response().await
    }

    pub async fn helo(&mut self, domain: &str) -> Result<Response, ClientError> {
        self.command(&format!("HELO {domain}")).await
    }

    pub async fn mail_from(&mut self, from: &str) -> Result<Response, ClientError> {
        self.command(&format!("MAIL FROM:<{from}>")).await
    }

    pub async fn rcpt_to(&mut self, to: &str) -> Result<Response, ClientError> {
        self.command(&format!("RCPT TO:<{to}>")).await
    }

    pub async fn data(&mut self) -> Result<Response, ClientError> {
        self.command("DATA").await
    }

    pub async fn quit(&mut self) -> Result<Response, ClientError> {
        self.command("QUIT").await
    }

    /// Transmits the message content after a 354 go-ahead and reads the
    /// reply.
    ///
    /// # Errors
    ///
    /// Returns an error when writing, reading, or parsing fails.
    pub async fn send_data(&mut self, payload: &str) -> Result<Response, ClientError> {
        self.writer
            .write_all(wire_format(payload).as_bytes())
            .await?;
        self.read_response().await
    }

    /// Reads a complete (possibly multi-line) reply.
    async fn read_response(&mut self) -> Result<Response, ClientError> {
        let mut lines = Vec::new();
        let mut code = None;

        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line).await? == 0 {
                return Err(ClientError::ConnectionClosed);
            }

            let parsed = ResponseLine::parse(line.trim_end_matches(['\r', '\n']))?;
            match code {
                None => code = Some(parsed.code),
                Some(expected) if expected != parsed.code => {
                    return Err(ClientError::CodeMismatch {
                        expected,
                        got: parsed.code,
                    });
                }
                Some(_) => {}
            }

            lines.push(parsed.text);
            if parsed.is_last {
                break;
            }
        }

        Ok(Response::new(code.unwrap_or_default(), lines))
    }
}

/// Renders a DATA payload for the wire: every line break becomes CRLF
/// (bare LF included, so dot-stuffing sees every line), lines beginning
/// with `.` are stuffed, and the `.` terminator is appended.
fn wire_format(payload: &str) -> String {
    let normalized = payload.replace("\r\n", "\n");

    let mut wire = String::with_capacity(normalized.len() + 8);
    for line in normalized.split('\n') {
        if line.starts_with('.') {
            wire.push('.');
        }
        wire.push_str(line);
        wire.push_str("\r\n");
    }
    wire.push_str(".\r\n");
    wire
}
