//! Timeout and listener configuration.
//!
//! Every blocking network step (DNS, connect, each SMTP read/write) is
//! individually bounded so one unresponsive peer cannot stall unrelated
//! domains or connections. Values deserialize with serde defaults, so a
//! partial config file or environment only needs to name what it changes.

use std::time::Duration;

use serde::Deserialize;

/// Timeouts for one outbound SMTP delivery attempt.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientTimeouts {
    /// TCP connect timeout per candidate host.
    ///
    /// Default: 10 seconds.
    #[serde(default = "defaults::connect_secs")]
    pub connect_secs: u64,

    /// Timeout per SMTP command exchange (greeting, HELO, MAIL FROM,
    /// RCPT TO, DATA initiation).
    ///
    /// Default: 30 seconds.
    #[serde(default = "defaults::command_secs")]
    pub command_secs: u64,

    /// Timeout for transmitting the message content after DATA.
    ///
    /// Default: 120 seconds.
    #[serde(default = "defaults::data_secs")]
    pub data_secs: u64,

    /// Timeout for the closing QUIT; expiry does not fail the delivery.
    ///
    /// Default: 10 seconds.
    #[serde(default = "defaults::quit_secs")]
    pub quit_secs: u64,
}

impl ClientTimeouts {
    #[must_use]
    pub const fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    #[must_use]
    pub const fn command(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }

    #[must_use]
    pub const fn data(&self) -> Duration {
        Duration::from_secs(self.data_secs)
    }

    #[must_use]
    pub const fn quit(&self) -> Duration {
        Duration::from_secs(self.quit_secs)
    }
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: defaults::connect_secs(),
            command_secs: defaults::command_secs(),
            data_secs: defaults::data_secs(),
            quit_secs: defaults::quit_secs(),
        }
    }
}

/// Configuration for the inbound SMTP receiver.
#[derive(Debug, Clone, Deserialize)]
pub struct ReceiverConfig {
    /// Address to listen on.
    #[serde(default = "defaults::listen_address")]
    pub address: String,

    /// Port to listen on.
    #[serde(default = "defaults::listen_port")]
    pub port: u16,

    /// Hostname announced in the greeting banner.
    #[serde(default = "defaults::hostname")]
    pub hostname: String,

    /// Idle timeout per command while a session is open.
    ///
    /// Default: 300 seconds (RFC 5321 server-side guidance).
    #[serde(default = "defaults::session_command_secs")]
    pub command_secs: u64,

    /// Upper bound on the size of one message's DATA payload, in bytes.
    ///
    /// Default: 10 MiB.
    #[serde(default = "defaults::max_message_bytes")]
    pub max_message_bytes: usize,
}

impl ReceiverConfig {
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            address: defaults::listen_address(),
            port: defaults::listen_port(),
            hostname: defaults::hostname(),
            command_secs: defaults::session_command_secs(),
            max_message_bytes: defaults::max_message_bytes(),
        }
    }
}

/// Default configuration values.
mod defaults {
    pub const fn connect_secs() -> u64 {
        10
    }
    pub const fn command_secs() -> u64 {
        30
    }
    pub const fn data_secs() -> u64 {
        120
    }
    pub const fn quit_secs() -> u64 {
        10
    }
    pub fn listen_address() -> String {
        "0.0.0.0".to_string()
    }
    pub const fn listen_port() -> u16 {
        2525
    }
    pub fn hostname() -> String {
        "localhost".to_string()
    }
    pub const fn session_command_secs() -> u64 {
        300
    }
    pub const fn max_message_bytes() -> usize {
        10 * 1024 * 1024
    }
}
