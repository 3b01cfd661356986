use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use scraping_common::QueryType;

use crate::config::GateConfig;
use crate::keywords::KeywordPool;
use crate::metagraph::SharedMetagraph;
use crate::synapse::{ScrapeSynapse, SynapseHeader};
use crate::update::UpdateMonitor;

/// Everything a plugin needs from the running miner.
#[derive(Clone)]
pub struct PluginContext {
    pub metagraph: SharedMetagraph,
    /// This miner's hotkey (ss58)
    pub hotkey: String,
    pub uid: Option<u16>,
    pub keywords: Arc<KeywordPool>,
    pub updates: UpdateMonitor,
    pub gate: GateConfig,
    pub query_limit: u32,
}

/// One request kind served by the axon.
#[async_trait]
pub trait ScrapingPlugin: Send + Sync {
    fn kind(&self) -> QueryType;

    /// Called once at registration, before any request is routed.
    async fn configure(&self, ctx: PluginContext) -> Result<()>;

    async fn forward(
        &self,
        header: &SynapseHeader,
        synapse: ScrapeSynapse,
    ) -> Result<ScrapeSynapse>;

    /// `(true, reason)` rejects the caller.
    async fn blacklist(&self, header: &SynapseHeader) -> (bool, String);

    /// Larger values are served first.
    async fn priority(&self, header: &SynapseHeader) -> u64;

    async fn verify(&self, header: &SynapseHeader) -> Result<(), String>;
}
