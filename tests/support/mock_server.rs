//! Scriptable SMTP server for exercising the delivery side against a real
//! TCP conversation.
#![allow(dead_code)] // shared across test binaries; not every test uses every knob

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;

/// One command observed by the mock, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    Helo(String),
    MailFrom(String),
    RcptTo(String),
    Data,
    MessageContent(String),
    Quit,
    Other(String),
}

#[derive(Debug, Clone)]
struct Script {
    greeting: (u16, String),
    helo: (u16, String),
    mail_from: (u16, String),
    rcpt_to: (u16, String),
    data: (u16, String),
    data_end: (u16, String),
    /// Accept the connection but wait this long before greeting.
    greeting_delay: Option<Duration>,
    /// Close the connection without replying after this many commands.
    drop_after_commands: Option<usize>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            greeting: (220, "mock ESMTP ready".to_string()),
            helo: (250, "hello".to_string()),
            mail_from: (250, "OK".to_string()),
            rcpt_to: (250, "OK".to_string()),
            data: (354, "end data with <CRLF>.<CRLF>".to_string()),
            data_end: (250, "message accepted".to_string()),
            greeting_delay: None,
            drop_after_commands: None,
        }
    }
}

/// A running mock server on an ephemeral loopback port.
pub struct MockSmtpServer {
    addr: SocketAddr,
    observed: Arc<RwLock<Vec<Observed>>>,
}

impl MockSmtpServer {
    pub fn builder() -> MockSmtpServerBuilder {
        MockSmtpServerBuilder {
            script: Script::default(),
        }
    }

    /// Starts a mock that accepts everything.
    pub async fn accepting() -> std::io::Result<Self> {
        Self::builder().build().await
    }

    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn observed(&self) -> Vec<Observed> {
        self.observed.read().await.clone()
    }

    async fn handle_client(
        stream: TcpStream,
        script: Arc<Script>,
        observed: Arc<RwLock<Vec<Observed>>>,
    ) -> std::io::Result<()> {
        let (read_half, mut writer) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut commands_seen = 0usize;

        if let Some(delay) = script.greeting_delay {
            tokio::time::sleep(delay).await;
        }
        reply(&mut writer, script.greeting.0, &script.greeting.1).await?;

        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Ok(());
            }

            commands_seen += 1;
            if let Some(limit) = script.drop_after_commands {
                if commands_seen > limit {
                    return Ok(());
                }
            }

            let trimmed = line.trim_end_matches(['\r', '\n']);
            let (verb, argument) = match trimmed.split_once(' ') {
                Some((v, a)) => (v.to_ascii_uppercase(), a.to_string()),
                None => (trimmed.to_ascii_uppercase(), String::new()),
            };

            match verb.as_str() {
                "HELO" | "EHLO" => {
                    observed.write().await.push(Observed::Helo(argument));
                    reply(&mut writer, script.helo.0, &script.helo.1).await?;
                }
                "MAIL" => {
                    observed.write().await.push(Observed::MailFrom(argument));
                    reply(&mut writer, script.mail_from.0, &script.mail_from.1).await?;
                }
                "RCPT" => {
                    observed.write().await.push(Observed::RcptTo(argument));
                    reply(&mut writer, script.rcpt_to.0, &script.rcpt_to.1).await?;
                }
                "DATA" => {
                    observed.write().await.push(Observed::Data);
                    reply(&mut writer, script.data.0, &script.data.1).await?;

                    if script.data.0 == 354 {
                        let mut content = String::new();
                        loop {
                            line.clear();
                            if reader.read_line(&mut line).await? == 0 {
                                return Ok(());
                            }
                            let data_line = line.trim_end_matches(['\r', '\n']);
                            if data_line == "." {
                                break;
                            }
                            content.push_str(data_line.strip_prefix('.').unwrap_or(data_line));
                            content.push_str("\r\n");
                        }
                        observed.write().await.push(Observed::MessageContent(content));
                        reply(&mut writer, script.data_end.0, &script.data_end.1).await?;
                    }
                }
                "QUIT" => {
                    observed.write().await.push(Observed::Quit);
                    reply(&mut writer, 221, "bye").await?;
                    return Ok(());
                }
                _ => {
                    observed.write().await.push(Observed::Other(trimmed.to_string()));
                    reply(&mut writer, 500, "unknown command").await?;
                }
            }
        }
    }
}

async fn reply(
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    code: u16,
    message: &str,
) -> std::io::Result<()> {
    writer
        .write_all(format!("{code} {message}\r\n").as_bytes())
        .await?;
    writer.flush().await
}

pub struct MockSmtpServerBuilder {
    script: Script,
}

impl MockSmtpServerBuilder {
    #[must_use]
    pub fn with_rcpt_to_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.script.rcpt_to = (code, message.into());
        self
    }

    #[must_use]
    pub fn with_data_end_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.script.data_end = (code, message.into());
        self
    }

    /// Accept the TCP connection but wait `delay` before sending the
    /// greeting.
    #[must_use]
    pub const fn with_greeting_delay(mut self, delay: Duration) -> Self {
        self.script.greeting_delay = Some(delay);
        self
    }

    /// Close the connection without replying once `count` commands have
    /// been received.
    #[must_use]
    pub const fn with_drop_after_commands(mut self, count: usize) -> Self {
        self.script.drop_after_commands = Some(count);
        self
    }

    pub async fn build(self) -> std::io::Result<MockSmtpServer> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let script = Arc::new(self.script);
        let observed = Arc::new(RwLock::new(Vec::new()));

        let accept_observed = observed.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _peer)) = listener.accept().await else {
                    return;
                };
                let script = script.clone();
                let observed = accept_observed.clone();
                tokio::spawn(async move {
                    let _ = MockSmtpServer::handle_client(stream, script, observed).await;
                });
            }
        });

        Ok(MockSmtpServer { addr, observed })
    }
}
