//! lattice-node: a full node for the lattice sharded BlockDAG.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod config;
mod node;

pub use config::{BrokerConfig, DiscoveryConfig, MiningConfig, NodeConfig};
pub use node::Node;

/// A full node for the lattice sharded BlockDAG.
#[derive(Parser, Debug)]
#[command(name = "lattice-node")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "lattice-node.toml")]
    pub config: PathBuf,

    /// Data directory
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Number of address groups
    #[arg(short, long)]
    pub groups: Option<u8>,

    /// Mining reward address (hex, applied to every group)
    #[arg(long)]
    pub miner_address: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Grace period for draining storage on shutdown.
const SHUTDOWN_GRACE_SECS: u64 = 10;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("starting lattice-node v{}", env!("CARGO_PKG_VERSION"));

    let config = NodeConfig::load(&args.config, &args)?;
    info!(data_dir = ?config.data_dir, groups = config.consensus.groups, "configuration loaded");

    let node = std::sync::Arc::new(Node::open(config)?);

    tokio::signal::ctrl_c().await.ok();
    info!("shutdown signal received");

    let closer = std::sync::Arc::clone(&node);
    let close = tokio::task::spawn_blocking(move || closer.close());
    match tokio::time::timeout(std::time::Duration::from_secs(SHUTDOWN_GRACE_SECS), close).await {
        Ok(result) => result??,
        Err(_) => {
            tracing::warn!("shutdown grace period elapsed, terminating");
        }
    }

    Ok(())
}
