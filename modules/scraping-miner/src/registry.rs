//! Routes each request kind to its plugin and owns the per-kind queues.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::info;

use scraping_common::{QueryType, ScrapingError};

use crate::plugin::{PluginContext, ScrapingPlugin};
use crate::queue::AsyncPriorityQueue;
use crate::synapse::{ScrapeSynapse, SynapseHeader};

/// A request admitted by the axon and waiting for a worker.
pub struct QueuedRequest {
    pub header: SynapseHeader,
    pub synapse: ScrapeSynapse,
    pub priority: u64,
    pub enqueued_at: Instant,
    pub respond_to: oneshot::Sender<Result<ScrapeSynapse, String>>,
}

/// A served request whose output is headed for storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedScrape {
    pub kind: QueryType,
    pub caller: Option<String>,
    pub search_keys: Vec<String>,
    pub output: Vec<Value>,
}

pub struct PluginQueues {
    pub inputs: AsyncPriorityQueue<QueuedRequest>,
    pub outputs: AsyncPriorityQueue<CompletedScrape>,
}

impl PluginQueues {
    pub fn new() -> Self {
        Self {
            inputs: AsyncPriorityQueue::new(),
            outputs: AsyncPriorityQueue::new(),
        }
    }
}

impl Default for PluginQueues {
    fn default() -> Self {
        Self::new()
    }
}

struct PluginEntry {
    plugin: Arc<dyn ScrapingPlugin>,
    queues: Arc<PluginQueues>,
}

#[derive(Default)]
pub struct PluginRegistry {
    plugins: HashMap<QueryType, PluginEntry>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure `plugin` and give it fresh queues. Replaces any plugin
    /// already registered for `kind`.
    pub async fn register_plugin(
        &mut self,
        kind: QueryType,
        plugin: Arc<dyn ScrapingPlugin>,
        ctx: PluginContext,
    ) -> Result<()> {
        if plugin.kind() != kind {
            return Err(ScrapingError::Config(format!(
                "plugin for {} cannot be registered as {kind}",
                plugin.kind()
            ))
            .into());
        }
        plugin.configure(ctx).await?;
        self.plugins.insert(
            kind,
            PluginEntry {
                plugin,
                queues: Arc::new(PluginQueues::new()),
            },
        );
        info!(%kind, synapse = kind.synapse_name(), "Registered plugin");
        Ok(())
    }

    pub fn kinds(&self) -> Vec<QueryType> {
        let mut kinds: Vec<_> = self.plugins.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Registered kind served under this synapse name.
    pub fn lookup_synapse(&self, name: &str) -> Option<QueryType> {
        QueryType::from_synapse_name(name).filter(|k| self.plugins.contains_key(k))
    }

    fn entry(&self, kind: QueryType) -> Result<&PluginEntry, ScrapingError> {
        self.plugins
            .get(&kind)
            .ok_or_else(|| ScrapingError::UnknownKind(kind.to_string()))
    }

    pub fn get_plugin_queues(&self, kind: QueryType) -> Result<Arc<PluginQueues>, ScrapingError> {
        Ok(self.entry(kind)?.queues.clone())
    }

    pub async fn call_forward_fn(
        &self,
        kind: QueryType,
        header: &SynapseHeader,
        synapse: ScrapeSynapse,
    ) -> Result<ScrapeSynapse> {
        self.entry(kind)?.plugin.forward(header, synapse).await
    }

    pub async fn call_blacklist_fn(
        &self,
        kind: QueryType,
        header: &SynapseHeader,
    ) -> Result<(bool, String), ScrapingError> {
        Ok(self.entry(kind)?.plugin.blacklist(header).await)
    }

    pub async fn call_priority_fn(
        &self,
        kind: QueryType,
        header: &SynapseHeader,
    ) -> Result<u64, ScrapingError> {
        Ok(self.entry(kind)?.plugin.priority(header).await)
    }

    pub async fn call_verify_fn(
        &self,
        kind: QueryType,
        header: &SynapseHeader,
    ) -> Result<Result<(), String>, ScrapingError> {
        Ok(self.entry(kind)?.plugin.verify(header).await)
    }
}
