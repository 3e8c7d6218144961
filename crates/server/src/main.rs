//! The gavel auction server binary.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use jsonrpsee::server::Server;
use tracing::info;

use gavel_engine::GenesisConfig;
use gavel_server::rpc::AuctionApiServer;
use gavel_server::AuctionServer;

#[derive(Debug, Parser)]
#[command(name = "gavel-server", about = "Live auction JSON-RPC server")]
struct Args {
    /// Address to listen on for HTTP and WebSocket connections.
    #[arg(long, default_value = "127.0.0.1:9955")]
    listen: SocketAddr,

    /// Optional genesis configuration file (JSON). Defaults apply when
    /// omitted.
    #[arg(long)]
    genesis: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gavel_server=info".parse().unwrap())
                .add_directive("jsonrpsee=warn".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    let config = match &args.genesis {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading genesis config {}", path.display()))?;
            serde_json::from_str::<GenesisConfig>(&raw)
                .with_context(|| format!("parsing genesis config {}", path.display()))?
        }
        None => GenesisConfig::default(),
    };
    let state = config.build().context("invalid genesis configuration")?;

    info!("Starting auction server on {}", args.listen);

    let server = Server::builder().build(args.listen).await?;
    let handle = server.start(AuctionServer::new(state).into_rpc());

    info!("Auction server running. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    handle.stop()?;
    handle.stopped().await;

    Ok(())
}
