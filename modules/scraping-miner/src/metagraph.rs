//! Subnet metagraph snapshot, its on-disk cache, and chain sync.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{info, warn};

pub const RAO_PER_TAO: f64 = 1_000_000_000.0;

/// Resync when the chain is this many blocks ahead of the snapshot.
pub const MAX_METAGRAPH_LAG: u64 = 5;

pub type SharedMetagraph = Arc<RwLock<Metagraph>>;

/// Per-uid columns are indexed by uid. Short bittensor names (`S`, `R`,
/// ...) are accepted when reading snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metagraph {
    pub netuid: u16,
    pub block: u64,
    pub hotkeys: Vec<String>,
    #[serde(default, alias = "S")]
    pub stake: Vec<f64>,
    #[serde(default, alias = "R")]
    pub ranks: Vec<f64>,
    #[serde(default, alias = "T")]
    pub trust: Vec<f64>,
    #[serde(default, alias = "C")]
    pub consensus: Vec<f64>,
    #[serde(default, alias = "I")]
    pub incentive: Vec<f64>,
    #[serde(default, alias = "E")]
    pub emission: Vec<f64>,
    #[serde(default)]
    pub validator_permit: Vec<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeuronStats {
    pub stake: f64,
    pub rank: f64,
    pub trust: f64,
    pub consensus: f64,
    pub incentive: f64,
    pub emission: f64,
}

fn column(values: &[f64], uid: u16) -> f64 {
    values.get(uid as usize).copied().unwrap_or(0.0)
}

impl Metagraph {
    pub fn uid_of(&self, hotkey: &str) -> Option<u16> {
        self.hotkeys
            .iter()
            .position(|k| k == hotkey)
            .and_then(|uid| u16::try_from(uid).ok())
    }

    pub fn contains(&self, hotkey: &str) -> bool {
        self.uid_of(hotkey).is_some()
    }

    /// Stake in TAO, `None` for unknown hotkeys.
    pub fn stake_of(&self, hotkey: &str) -> Option<f64> {
        self.uid_of(hotkey).map(|uid| column(&self.stake, uid))
    }

    /// Stake in rao, used as request priority.
    pub fn priority_of(&self, hotkey: &str) -> Option<u64> {
        self.stake_of(hotkey)
            .map(|stake| (stake.max(0.0) * RAO_PER_TAO).round() as u64)
    }

    pub fn has_validator_permit(&self, uid: u16) -> bool {
        self.validator_permit
            .get(uid as usize)
            .copied()
            .unwrap_or(false)
    }

    pub fn neuron_stats(&self, uid: u16) -> Option<NeuronStats> {
        if uid as usize >= self.hotkeys.len() {
            return None;
        }
        Some(NeuronStats {
            stake: column(&self.stake, uid),
            rank: column(&self.ranks, uid),
            trust: column(&self.trust, uid),
            consensus: column(&self.consensus, uid),
            incentive: column(&self.incentive, uid),
            emission: column(&self.emission, uid),
        })
    }

    /// Non-empty columns must have one entry per hotkey.
    pub fn validate(&self) -> Result<()> {
        let n = self.hotkeys.len();
        let columns = [
            ("stake", self.stake.len()),
            ("ranks", self.ranks.len()),
            ("trust", self.trust.len()),
            ("consensus", self.consensus.len()),
            ("incentive", self.incentive.len()),
            ("emission", self.emission.len()),
            ("validator_permit", self.validator_permit.len()),
        ];
        for (name, len) in columns {
            if len != 0 && len != n {
                bail!("metagraph column {name} has {len} entries for {n} hotkeys");
            }
        }
        Ok(())
    }
}

// --- Chain access ---

#[async_trait]
pub trait Subtensor: Send + Sync {
    /// Current chain head block number.
    async fn block(&self) -> Result<u64>;
    async fn metagraph(&self, netuid: u16) -> Result<Metagraph>;
}

/// Well-known networks; an explicit chain endpoint wins over these.
pub fn network_endpoint(network: &str) -> &str {
    match network {
        "finney" => "wss://entrypoint-finney.opentensor.ai:443",
        "test" => "wss://test.finney.opentensor.ai:443",
        "local" => "ws://127.0.0.1:9944",
        other => other,
    }
}

/// JSON-RPC over HTTP accepts the same host as the websocket endpoint.
fn rpc_url(endpoint: &str) -> String {
    if let Some(rest) = endpoint.strip_prefix("wss://") {
        format!("https://{rest}")
    } else if let Some(rest) = endpoint.strip_prefix("ws://") {
        format!("http://{rest}")
    } else {
        endpoint.to_string()
    }
}

pub struct SubtensorClient {
    http: reqwest::Client,
    rpc_url: String,
    metagraph_url: Option<String>,
}

impl SubtensorClient {
    pub fn new(chain_endpoint: &str, metagraph_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            rpc_url: rpc_url(chain_endpoint),
            metagraph_url,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.rpc_url
    }

    fn snapshot_url(&self, netuid: u16) -> Result<String> {
        let url = self
            .metagraph_url
            .as_deref()
            .context("METAGRAPH_URL is not set; cannot fetch the metagraph")?;
        Ok(if url.contains("{netuid}") {
            url.replace("{netuid}", &netuid.to_string())
        } else if url.contains('?') {
            format!("{url}&netuid={netuid}")
        } else {
            format!("{url}?netuid={netuid}")
        })
    }
}

#[async_trait]
impl Subtensor for SubtensorClient {
    async fn block(&self) -> Result<u64> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "chain_getHeader",
            "params": [],
        });
        let resp: Value = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .context("subtensor RPC request failed")?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = resp.get("error") {
            bail!("subtensor RPC error: {err}");
        }
        let number = resp
            .pointer("/result/number")
            .and_then(Value::as_str)
            .context("chain_getHeader response has no block number")?;
        parse_block_number(number)
    }

    async fn metagraph(&self, netuid: u16) -> Result<Metagraph> {
        let url = self.snapshot_url(netuid)?;
        let metagraph: Metagraph = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("fetching metagraph from {url}"))?
            .error_for_status()?
            .json()
            .await
            .context("metagraph snapshot is not valid JSON")?;
        metagraph.validate()?;
        if metagraph.netuid != netuid {
            bail!(
                "metagraph snapshot is for netuid {}, expected {netuid}",
                metagraph.netuid
            );
        }
        Ok(metagraph)
    }
}

/// Block numbers come back hex encoded, e.g. `"0x1a2b"`.
pub fn parse_block_number(number: &str) -> Result<u64> {
    let digits = number.trim_start_matches("0x");
    u64::from_str_radix(digits, 16).with_context(|| format!("invalid block number {number}"))
}

// --- Cache ---

/// Last synced metagraph, kept in the miner state directory.
pub struct MetagraphCache {
    path: PathBuf,
}

impl MetagraphCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn load(&self) -> Result<Metagraph> {
        let raw = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("reading {}", self.path.display()))?;
        let metagraph: Metagraph = serde_json::from_slice(&raw)?;
        metagraph.validate()?;
        Ok(metagraph)
    }

    pub async fn save(&self, metagraph: &Metagraph) -> Result<()> {
        let raw = serde_json::to_vec(metagraph)?;
        tokio::fs::write(&self.path, raw)
            .await
            .with_context(|| format!("writing {}", self.path.display()))
    }
}

/// Load the cached metagraph (or fetch it), then resync if it has fallen
/// more than [`MAX_METAGRAPH_LAG`] blocks behind the chain.
pub async fn sync_metagraph(
    subtensor: &dyn Subtensor,
    cache: &MetagraphCache,
    netuid: u16,
) -> Result<Metagraph> {
    let (mut metagraph, mut fresh) = match cache.load().await {
        Ok(m) if m.netuid == netuid => {
            info!(block = m.block, "Loaded metagraph from cache");
            (m, false)
        }
        _ => (subtensor.metagraph(netuid).await?, true),
    };

    let block = subtensor.block().await?;
    if block.saturating_sub(metagraph.block) > MAX_METAGRAPH_LAG {
        info!(
            chain_block = block,
            metagraph_block = metagraph.block,
            "Metagraph is stale, resyncing"
        );
        metagraph = subtensor.metagraph(netuid).await?;
        fresh = true;
    }

    if fresh {
        if let Err(e) = cache.save(&metagraph).await {
            warn!(error = %e, "Failed to cache metagraph");
        }
    }
    Ok(metagraph)
}
