//! Delivers one JSON-described message to its recipients' mail servers.
//!
//! Reads the message from a file argument or stdin:
//!
//! ```json
//! {
//!   "from": "sender@example.com",
//!   "to": ["recipient@example.com"],
//!   "subject": "Subject",
//!   "body": "Body content"
//! }
//! ```

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use courier::config::ClientTimeouts;
use courier::delivery::HickoryMxLookup;
use courier::smtp::TcpSmtpSession;
use courier::{Courier, OutboundMessage};

#[derive(Debug, Parser)]
#[command(name = "courier-send", about = "Send a JSON-described email message")]
struct Args {
    /// Path to the JSON message; stdin when omitted.
    input: Option<PathBuf>,

    /// Domain announced in the HELO command.
    #[arg(long, env = "SMTP_HELO_DOMAIN", default_value = "localhost")]
    helo_domain: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    courier::logging::init();

    match run(Args::parse()).await {
        Ok(all_delivered) => {
            if all_delivered {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<bool> {
    let raw = match &args.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read message from stdin")?;
            buffer
        }
    };

    let message: OutboundMessage =
        serde_json::from_str(&raw).context("invalid message JSON")?;

    let timeouts = ClientTimeouts::default();
    let lookup = HickoryMxLookup::new(timeouts.command())
        .context("failed to initialize DNS resolver")?;
    let session = TcpSmtpSession::new(args.helo_domain, timeouts);

    let courier = Courier::new(Arc::new(lookup), Arc::new(session));
    let report = courier.send(&message).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(report.delivered_all())
}
