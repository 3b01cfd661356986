//! Twitter and Reddit scraping plugins.
//!
//! Both sources share admission and forward logic and differ only in the
//! query that backs them.

use std::collections::HashMap;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use scraping_common::{check_version, QueryType, ScrapingError, Version};

use crate::plugin::{PluginContext, ScrapingPlugin};
use crate::queries::{QueryContext, ScrapeQuery};
use crate::synapse::{ScrapeSynapse, SynapseHeader};

pub struct ScrapeSource {
    kind: QueryType,
    query: Box<dyn ScrapeQuery>,
    ctx: OnceLock<PluginContext>,
    /// Last nonce seen per dendrite hotkey
    nonces: Mutex<HashMap<String, u64>>,
}

impl ScrapeSource {
    pub fn new(kind: QueryType, query: Box<dyn ScrapeQuery>) -> Self {
        Self {
            kind,
            query,
            ctx: OnceLock::new(),
            nonces: Mutex::new(HashMap::new()),
        }
    }

    pub fn twitter(query: Box<dyn ScrapeQuery>) -> Self {
        Self::new(QueryType::Twitter, query)
    }

    pub fn reddit(query: Box<dyn ScrapeQuery>) -> Self {
        Self::new(QueryType::Reddit, query)
    }

    fn context(&self) -> Result<&PluginContext, ScrapingError> {
        self.ctx
            .get()
            .ok_or_else(|| ScrapingError::Config(format!("{} plugin is not configured", self.kind)))
    }
}

#[async_trait]
impl ScrapingPlugin for ScrapeSource {
    fn kind(&self) -> QueryType {
        self.kind
    }

    async fn configure(&self, ctx: PluginContext) -> Result<()> {
        self.ctx
            .set(ctx)
            .map_err(|_| ScrapingError::Config(format!("{} plugin configured twice", self.kind)))?;
        Ok(())
    }

    async fn forward(
        &self,
        header: &SynapseHeader,
        mut synapse: ScrapeSynapse,
    ) -> Result<ScrapeSynapse> {
        let ctx = self.context()?;
        let caller = header.caller_hotkey().map(String::from);
        let validator_uid = match &caller {
            Some(hotkey) => ctx.metagraph.read().await.uid_of(hotkey),
            None => None,
        };

        let validator_version = match synapse.version {
            None => {
                info!(
                    kind = %self.kind,
                    ?validator_uid,
                    "Request carries no version, serving anyway"
                );
                None
            }
            Some(remote) => {
                ctx.updates.observe(&remote);
                if !check_version(&remote) {
                    warn!(
                        kind = %self.kind,
                        ?validator_uid,
                        remote = %remote,
                        local = %Version::current(),
                        "Incompatible validator version, replying without output"
                    );
                    synapse.version = Some(Version::current());
                    return Ok(synapse);
                }
                Some(remote.to_string())
            }
        };

        if ctx.updates.is_scheduled() {
            debug!(kind = %self.kind, "Update scheduled, not serving");
            return Ok(synapse);
        }

        let search_keys = match &synapse.scrap_input {
            Some(input) if !input.is_empty() => input.search_key.clone(),
            _ => {
                let keyword = ctx
                    .keywords
                    .random()
                    .context("keyword pool is empty")?
                    .to_string();
                info!(kind = %self.kind, %keyword, "No search key given, using a random keyword");
                vec![keyword]
            }
        };

        let query_ctx = QueryContext {
            validator_key: caller,
            validator_version,
            miner_uid: ctx.uid,
        };
        let records = self
            .query
            .execute(&search_keys, ctx.query_limit, &query_ctx)
            .await?;

        info!(
            kind = %self.kind,
            ?validator_uid,
            count = records.len(),
            "Returning scraped records"
        );
        synapse.version = Some(Version::current());
        synapse.scrap_output = Some(records);
        Ok(synapse)
    }

    async fn blacklist(&self, header: &SynapseHeader) -> (bool, String) {
        let Ok(ctx) = self.context() else {
            return (true, "Plugin not configured".to_string());
        };
        let Some(hotkey) = header.caller_hotkey() else {
            return (true, "Missing dendrite hotkey".to_string());
        };

        let metagraph = ctx.metagraph.read().await;
        let Some(uid) = metagraph.uid_of(hotkey) else {
            trace!(%hotkey, "Blacklisting unrecognized hotkey");
            return (true, "Unrecognized hotkey".to_string());
        };

        if ctx.gate.require_validator_permit && !metagraph.has_validator_permit(uid) {
            trace!(%hotkey, uid, "Blacklisting hotkey without validator permit");
            return (true, "No validator permit".to_string());
        }

        let stake = metagraph.stake_of(hotkey).unwrap_or(0.0);
        if stake < ctx.gate.min_stake {
            trace!(%hotkey, uid, stake, "Blacklisting low-stake hotkey");
            return (
                true,
                format!("Stake {stake} below minimum {}", ctx.gate.min_stake),
            );
        }

        trace!(%hotkey, uid, "Not blacklisting recognized hotkey");
        (false, "Hotkey recognized!".to_string())
    }

    async fn priority(&self, header: &SynapseHeader) -> u64 {
        let (Ok(ctx), Some(hotkey)) = (self.context(), header.caller_hotkey()) else {
            return 0;
        };
        let priority = ctx.metagraph.read().await.priority_of(hotkey).unwrap_or(0);
        trace!(%hotkey, priority, "Prioritizing request");
        priority
    }

    async fn verify(&self, header: &SynapseHeader) -> Result<(), String> {
        let ctx = self.context().map_err(|e| e.to_string())?;

        if let Some(target) = header.axon.hotkey.as_deref() {
            if target != ctx.hotkey {
                return Err(format!("Request addressed to {target}, not this axon"));
            }
        }

        let (Some(caller), Some(nonce)) = (header.caller_hotkey(), header.dendrite.nonce) else {
            return Ok(());
        };
        let mut nonces = self.nonces.lock().await;
        match nonces.get(caller) {
            Some(last) if nonce <= *last => Err(format!(
                "Nonce {nonce} is not newer than last seen {last}"
            )),
            _ => {
                nonces.insert(caller.to_string(), nonce);
                Ok(())
            }
        }
    }
}
