//! Inbound SMTP receiver.
//!
//! With `--backend-url`, recipient validation and storage go through the
//! backend HTTP API; otherwise a fixed `--user` list with in-memory storage
//! is used.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use courier::backend::BackendClient;
use courier::config::ReceiverConfig;
use courier::directory::StaticDirectory;
use courier::smtp::SmtpReceiver;
use courier::store::MemoryStore;
use courier::Intake;

#[derive(Debug, Parser)]
#[command(name = "courier-recv", about = "Receive email over SMTP")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "SMTP_SERVER_ADDRESS", default_value = "0.0.0.0")]
    address: String,

    /// Port to listen on.
    #[arg(long, env = "SMTP_SERVER_PORT", default_value_t = 2525)]
    port: u16,

    /// Hostname announced in the greeting banner.
    #[arg(long, env = "SMTP_SERVER_HOSTNAME", default_value = "localhost")]
    hostname: String,

    /// Base URL of the backend API used for recipient validation and
    /// message storage.
    #[arg(long, env = "BACKEND_API_URL")]
    backend_url: Option<String>,

    /// Shared secret sent to the backend API in the X-API-Key header.
    #[arg(long, env = "BACKEND_API_KEY", requires = "backend_url")]
    api_key: Option<String>,

    /// Known local usernames; mail for anyone else is refused. Ignored
    /// when a backend URL is configured.
    #[arg(long = "user", required_unless_present = "backend_url")]
    users: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    courier::logging::init();

    let args = Args::parse();
    let config = ReceiverConfig {
        address: args.address,
        port: args.port,
        hostname: args.hostname,
        ..ReceiverConfig::default()
    };

    let intake = match args.backend_url {
        Some(base_url) => {
            let api_key = args
                .api_key
                .context("--api-key (BACKEND_API_KEY) is required with --backend-url")?;
            let backend = Arc::new(BackendClient::new(base_url, api_key)?);
            Intake::new(backend.clone(), backend)
        }
        None => Intake::new(
            Arc::new(StaticDirectory::new(args.users)),
            Arc::new(MemoryStore::default()),
        ),
    };

    SmtpReceiver::new(config, intake).run().await?;

    Ok(())
}
