//! Fixtures shared by unit tests.

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderValue};
use tokio::sync::RwLock;

use crate::config::GateConfig;
use crate::keywords::KeywordPool;
use crate::metagraph::Metagraph;
use crate::plugin::PluginContext;
use crate::synapse::{SynapseHeader, DEFAULT_TIMEOUT};
use crate::update::UpdateMonitor;

pub const MINER_HOTKEY: &str = "5Miner";

/// Metagraph with the miner at uid 0 followed by `(hotkey, stake, permit)`.
pub fn metagraph(neurons: &[(&str, f64, bool)]) -> Metagraph {
    let mut g = Metagraph {
        netuid: 3,
        block: 100,
        hotkeys: vec![MINER_HOTKEY.to_string()],
        stake: vec![0.0],
        validator_permit: vec![false],
        ..Default::default()
    };
    for (hotkey, stake, permit) in neurons {
        g.hotkeys.push(hotkey.to_string());
        g.stake.push(*stake);
        g.validator_permit.push(*permit);
    }
    g
}

pub fn context(neurons: &[(&str, f64, bool)]) -> PluginContext {
    PluginContext {
        metagraph: Arc::new(RwLock::new(metagraph(neurons))),
        hotkey: MINER_HOTKEY.to_string(),
        uid: Some(0),
        keywords: Arc::new(KeywordPool::from_lines("bittensor")),
        updates: UpdateMonitor::new(true),
        gate: GateConfig::default(),
        query_limit: 15,
    }
}

pub fn header(caller: &str) -> SynapseHeader {
    let mut headers = HeaderMap::new();
    if let Ok(v) = HeaderValue::from_str(caller) {
        headers.insert("bt_header_dendrite_hotkey", v);
    }
    SynapseHeader::from_headers("TwitterScrap", &headers, DEFAULT_TIMEOUT)
}
