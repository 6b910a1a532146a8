use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use tezos_delegation_service::api::{self, ApiState};
use tezos_delegation_service::config::Config;
use tezos_delegation_service::poller::Poller;
use tezos_delegation_service::repository::{DelegationRepository, SqliteRepository};
use tezos_delegation_service::transport::{DelegationSource, TzktClient};

#[derive(Parser)]
#[command(name = "tezos-delegation-service")]
#[command(about = "Ingests Tezos delegations from the TzKT API and serves them over HTTP")]
#[command(version)]
struct Args {
    /// Base URL of the TzKT API (or set TZKT_API_URL env var)
    #[arg(long)]
    tzkt_url: Option<String>,

    /// Path to the SQLite database file (or set DATABASE_PATH env var)
    #[arg(long)]
    database: Option<String>,

    /// Address for the HTTP API to listen on (or set BIND_ADDR env var)
    #[arg(long)]
    bind: Option<String>,

    /// Seconds between steady-state poll ticks (or set POLL_INTERVAL_SECS env var)
    #[arg(long)]
    poll_interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = Config::resolve(
        args.tzkt_url,
        args.database,
        args.bind,
        args.poll_interval_secs,
    );

    let repo: Arc<dyn DelegationRepository> = Arc::new(SqliteRepository::new(&config.database_path)?);
    let source: Arc<dyn DelegationSource> = Arc::new(TzktClient::new(&config.tzkt_api_url));

    // Background ingestion: backfill once, then poll on a timer
    let poller = Arc::new(Poller::new(
        Arc::clone(&repo),
        source,
        config.poll_interval,
    ));
    poller.start();

    info!("Starting server on {}", config.bind_addr);
    api::start_server(&config.bind_addr, ApiState { repo }).await?;

    Ok(())
}
