use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

use crate::metagraph::network_endpoint;
use crate::queries::QueryProvider;
use crate::wallet::expand_tilde;

/// Command-line flags. Dotted names match the subnet's other tooling.
#[derive(Parser, Debug, Clone)]
#[command(name = "miner", about = "Scraping subnet miner")]
pub struct Cli {
    /// Subnet to mine on
    #[arg(long, default_value_t = 3)]
    pub netuid: u16,

    /// finney, test, local, or an endpoint URL
    #[arg(long = "subtensor.network", default_value = "finney")]
    pub subtensor_network: String,

    /// Overrides the endpoint implied by --subtensor.network
    #[arg(long = "subtensor.chain_endpoint")]
    pub chain_endpoint: Option<String>,

    #[arg(long = "wallet.name", default_value = "default")]
    pub wallet_name: String,

    #[arg(long = "wallet.hotkey", default_value = "default")]
    pub wallet_hotkey: String,

    #[arg(long = "wallet.path", default_value = "~/.bittensor/wallets/")]
    pub wallet_path: String,

    #[arg(long = "axon.port", default_value_t = 8091)]
    pub axon_port: u16,

    #[arg(long = "axon.ip", default_value = "0.0.0.0")]
    pub axon_ip: String,

    #[arg(long = "logging.logging_dir", default_value = "~/.bittensor/miners")]
    pub logging_dir: String,

    #[arg(long = "logging.debug")]
    pub debug: bool,

    #[arg(long = "logging.trace")]
    pub trace: bool,

    /// Emit JSON log lines
    #[arg(long = "logging.json")]
    pub json_logs: bool,

    /// "yes" to exit when a validator reports a newer version
    #[arg(long = "auto-update", default_value = "yes")]
    pub auto_update: String,

    /// Fallback search terms, one per line
    #[arg(long, default_value = "keywords.txt")]
    pub keywords: PathBuf,

    /// Optional TOML file with tuning knobs
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn auto_update_enabled(&self) -> bool {
        !matches!(
            self.auto_update.trim().to_lowercase().as_str(),
            "no" | "false" | "0" | "off"
        )
    }

    pub fn chain_endpoint(&self) -> &str {
        self.chain_endpoint
            .as_deref()
            .unwrap_or_else(|| network_endpoint(&self.subtensor_network))
    }

    /// `{logging_dir}/{wallet}/{hotkey}/netuid{n}/miner`
    pub fn state_dir(&self) -> PathBuf {
        expand_tilde(&self.logging_dir)
            .join(&self.wallet_name)
            .join(&self.wallet_hotkey)
            .join(format!("netuid{}", self.netuid))
            .join("miner")
    }

    /// Default log filter; `RUST_LOG` still takes precedence.
    pub fn log_level(&self) -> &'static str {
        if self.trace {
            "trace"
        } else if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

/// TOML-backed tuning. Every section and field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub axon: AxonConfig,
    #[serde(default)]
    pub queries: QueriesConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AxonConfig {
    /// Worker tasks draining each plugin's inputs queue
    pub workers_per_plugin: usize,
    pub default_timeout_secs: u64,
}

impl Default for AxonConfig {
    fn default() -> Self {
        Self {
            workers_per_plugin: 4,
            default_timeout_secs: 12,
        }
    }
}

impl AxonConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueriesConfig {
    pub twitter: QueryProvider,
    pub reddit: QueryProvider,
    /// Items requested per actor run
    pub limit: u32,
}

impl Default for QueriesConfig {
    fn default() -> Self {
        Self {
            twitter: QueryProvider::TweetScraper,
            reddit: QueryProvider::RedditScraperLite,
            limit: 15,
        }
    }
}

/// Extra admission rules on top of metagraph membership.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    /// Minimum caller stake in TAO
    pub min_stake: f64,
    pub require_validator_permit: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub enabled: bool,
    /// Completed scrapes collected before a CSV file is written
    pub batch_size: usize,
    pub flush_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: 10,
            flush_interval_secs: 300,
        }
    }
}

impl StorageConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs.max(1))
    }
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_flags_parse() {
        let cli = Cli::try_parse_from([
            "miner",
            "--netuid",
            "12",
            "--wallet.name",
            "cold",
            "--wallet.hotkey",
            "hot",
            "--logging.logging_dir",
            "/tmp/miners",
            "--subtensor.network",
            "test",
            "--auto-update",
            "no",
            "--logging.debug",
        ])
        .unwrap();

        assert_eq!(cli.netuid, 12);
        assert!(!cli.auto_update_enabled());
        assert_eq!(cli.log_level(), "debug");
        assert_eq!(cli.chain_endpoint(), "wss://test.finney.opentensor.ai:443");
        assert_eq!(
            cli.state_dir(),
            PathBuf::from("/tmp/miners/cold/hot/netuid12/miner")
        );
    }

    #[test]
    fn defaults_match_the_subnet() {
        let cli = Cli::try_parse_from(["miner"]).unwrap();
        assert_eq!(cli.netuid, 3);
        assert_eq!(cli.axon_port, 8091);
        assert!(cli.auto_update_enabled());
        assert_eq!(cli.log_level(), "info");

        let cli = Cli::try_parse_from(["miner", "--subtensor.chain_endpoint", "ws://node:9944"])
            .unwrap();
        assert_eq!(cli.chain_endpoint(), "ws://node:9944");
    }

    #[test]
    fn partial_file_config_keeps_defaults() {
        let config: FileConfig = toml::from_str(
            r#"
            [queries]
            reddit = "reddit-scraper"

            [gate]
            min_stake = 1000.0
            "#,
        )
        .unwrap();

        assert_eq!(config.queries.reddit, QueryProvider::RedditScraper);
        assert_eq!(config.queries.twitter, QueryProvider::TweetScraper);
        assert_eq!(config.queries.limit, 15);
        assert_eq!(config.gate.min_stake, 1000.0);
        assert_eq!(config.axon.workers_per_plugin, 4);
        assert!(config.storage.enabled);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<FileConfig>("[axon]\nthreads = 3").is_err());
        assert!(toml::from_str::<FileConfig>("[metrics]\nport = 1").is_err());
    }

    #[test]
    fn load_config_reads_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "[storage]\nbatch_size = 2\n").unwrap();
        assert_eq!(load_config(file.path()).unwrap().storage.batch_size, 2);
    }
}
