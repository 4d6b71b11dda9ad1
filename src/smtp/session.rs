//! Outbound SMTP client session capability.
//!
//! [`SmtpClientSession`] is the seam between the delivery driver and the
//! byte-level SMTP conversation: given a dial target and a per-domain
//! message it either lands the message or reports why this host failed.
//! [`TcpSmtpSession`] is the built-in implementation; test doubles stand in
//! for it in the delivery tests.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use super::client::{ClientError, SmtpClient};
use super::response::Response;
use crate::config::ClientTimeouts;
use crate::outbound::OutboundMessage;

/// Errors from one delivery attempt against one host.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    #[error("{phase} timed out after {timeout:?}")]
    Timeout {
        phase: &'static str,
        timeout: Duration,
    },

    #[error("server rejected {command}: {code} {reply}")]
    Rejected {
        command: &'static str,
        code: u16,
        reply: String,
    },

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Performs the SMTP conversation for one message against one host.
#[async_trait]
pub trait SmtpClientSession: Send + Sync {
    /// Delivers `message` to the server at `addr` (`host:port`).
    ///
    /// The message is already narrowed to a single domain's recipients;
    /// every address in to/cc/bcc gets a `RCPT TO`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] describing where the attempt failed, so the
    /// driver can record it and move to the next candidate.
    async fn deliver(&self, addr: &str, message: &OutboundMessage) -> Result<(), SessionError>;
}

/// Plain-TCP SMTP session: HELO, MAIL FROM, RCPT TO per recipient, DATA,
/// QUIT, with every exchange individually timeout-bounded.
pub struct TcpSmtpSession {
    helo_domain: String,
    timeouts: ClientTimeouts,
}

impl TcpSmtpSession {
    #[must_use]
    pub const fn new(helo_domain: String, timeouts: ClientTimeouts) -> Self {
        Self {
            helo_domain,
            timeouts,
        }
    }

    /// Runs `future` under `timeout`, mapping expiry to a phase-tagged
    /// session error.
    async fn bounded<F>(
        phase: &'static str,
        timeout: Duration,
        future: F,
    ) -> Result<Response, SessionError>
    where
        F: std::future::Future<Output = Result<Response, ClientError>>,
    {
        tokio::time::timeout(timeout, future)
            .await
            .map_err(|_| SessionError::Timeout { phase, timeout })?
            .map_err(SessionError::from)
    }

    fn expect_success(
        command: &'static str,
        response: &Response,
    ) -> Result<(), SessionError> {
        if response.is_success() {
            Ok(())
        } else {
            Err(SessionError::Rejected {
                command,
                code: response.code,
                reply: response.message(),
            })
        }
    }
}

#[async_trait]
impl SmtpClientSession for TcpSmtpSession {
    async fn deliver(&self, addr: &str, message: &OutboundMessage) -> Result<(), SessionError> {
        let command_timeout = self.timeouts.command();

        let mut client = tokio::time::timeout(self.timeouts.connect(), SmtpClient::connect(addr))
            .await
            .map_err(|_| SessionError::Timeout {
                phase: "connect",
                timeout: self.timeouts.connect(),
            })?
            .map_err(|e| SessionError::Connect {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;

        debug!(addr, "connected, starting SMTP conversation");

        let greeting =
            Self::bounded("greeting", command_timeout, client.read_greeting()).await?;
        Self::expect_success("greeting", &greeting)?;

        let helo = Self::bounded("HELO", command_timeout, client.helo(&self.helo_domain)).await?;
        Self::expect_success("HELO", &helo)?;

        let mail =
            Self::bounded("MAIL FROM", command_timeout, client.mail_from(&message.from)).await?;
        Self::expect_success("MAIL FROM", &mail)?;

        for recipient in message
            .to
            .iter()
            .chain(message.cc.iter())
            .chain(message.bcc.iter())
        {
            let rcpt = Self::bounded("RCPT TO", command_timeout, client.rcpt_to(recipient)).await?;
            Self::expect_success("RCPT TO", &rcpt)?;
        }

        let data = Self::bounded("DATA", command_timeout, client.data()).await?;
        if !data.is_intermediate() {
            return Err(SessionError::Rejected {
                command: "DATA",
                code: data.code,
                reply: data.message(),
            });
        }

        let payload = message.to_rfc5322();
        let accepted =
            Self::bounded("message data", self.timeouts.data(), client.send_data(&payload))
                .await?;
        Self::expect_success("message data", &accepted)?;

        // Best-effort goodbye; the message is already accepted.
        if let Err(e) = Self::bounded("QUIT", self.timeouts.quit(), client.quit()).await {
            warn!(addr, error = %e, "QUIT after successful delivery failed");
        }

        Ok(())
    }
}
