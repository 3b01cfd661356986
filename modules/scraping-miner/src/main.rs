use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use scraping_common::Secrets;
use scraping_miner::config::load_config;
use scraping_miner::{Cli, FileConfig, Miner};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", cli.log_level())));
    if cli.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting miner");

    let config = match &cli.config {
        Some(path) => {
            tracing::info!(config = %path.display(), "Loading config");
            load_config(path)?
        }
        None => FileConfig::default(),
    };
    let secrets = Secrets::from_env()?;

    Miner::new(cli, config, secrets).run().await
}
