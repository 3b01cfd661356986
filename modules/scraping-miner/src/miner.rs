//! Miner startup, main loop and shutdown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures::FutureExt;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use apify_client::ApifyClient;
use scraping_common::{QueryType, Secrets, Version};
use scraping_storage::{BatchStore, HttpIndexer, Indexer, NoopIndexer, S3Store};

use crate::axon::{self, AxonState};
use crate::batcher::ResultBatcher;
use crate::bus::{
    results_topic, DispatchMiddleware, MemoryTransport, MessageBus, Transport, TransportBus,
    SERVED_TOPIC,
};
use crate::config::{Cli, FileConfig, QueriesConfig};
use crate::keywords::KeywordPool;
use crate::metagraph::{
    sync_metagraph, Metagraph, MetagraphCache, NeuronStats, SharedMetagraph, SubtensorClient,
};
use crate::plugin::PluginContext;
use crate::queries::{get_query, ActorRunner};
use crate::registry::{CompletedScrape, PluginRegistry};
use crate::sources::ScrapeSource;
use crate::synapse::TerminalInfo;
use crate::update::UpdateMonitor;
use crate::wallet::Wallet;

/// Main loop tick.
const STEP: Duration = Duration::from_secs(1);

/// Steps between metagraph syncs and status lines.
const STATUS_INTERVAL_STEPS: u64 = 60;

/// How long in-flight requests get to finish on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(15);

/// Register a [`ScrapeSource`] for every request kind, backed by the
/// configured query providers.
pub async fn build_registry(
    ctx: PluginContext,
    runner: Arc<dyn ActorRunner>,
    queries: &QueriesConfig,
) -> Result<PluginRegistry> {
    let mut registry = PluginRegistry::new();
    for (kind, provider) in [
        (QueryType::Twitter, queries.twitter),
        (QueryType::Reddit, queries.reddit),
    ] {
        let query = get_query(kind, provider, runner.clone())?;
        info!(%kind, %provider, "Using query provider");
        registry
            .register_plugin(kind, Arc::new(ScrapeSource::new(kind, query)), ctx.clone())
            .await?;
    }
    Ok(registry)
}

pub fn status_line(step: u64, block: u64, stats: &NeuronStats) -> String {
    format!(
        "Step:{step} | Block:{block} | Stake:{:.4} | Rank:{:.4} | Trust:{:.4} | \
         Consensus:{:.6} | Incentive:{:.6} | Emission:{:.6}",
        stats.stake, stats.rank, stats.trust, stats.consensus, stats.incentive, stats.emission
    )
}

/// `100 * major + 10 * minor + patch`, the integer form carried in headers.
fn version_code(v: &Version) -> u64 {
    100 * u64::from(v.major_version.unwrap_or(0))
        + 10 * u64::from(v.minor_version.unwrap_or(0))
        + u64::from(v.patch_version.unwrap_or(0))
}

pub struct Miner {
    cli: Cli,
    config: FileConfig,
    secrets: Secrets,
}

impl Miner {
    pub fn new(cli: Cli, config: FileConfig, secrets: Secrets) -> Self {
        Self {
            cli,
            config,
            secrets,
        }
    }

    pub async fn run(self) -> Result<()> {
        let netuid = self.cli.netuid;
        let state_dir = self.cli.state_dir();
        tokio::fs::create_dir_all(&state_dir)
            .await
            .with_context(|| format!("creating state directory {}", state_dir.display()))?;
        info!(state_dir = %state_dir.display(), "Miner state directory ready");

        let wallet = Wallet::load(
            &self.cli.wallet_path,
            &self.cli.wallet_name,
            &self.cli.wallet_hotkey,
        )?;
        info!("{wallet}");

        let subtensor =
            SubtensorClient::new(self.cli.chain_endpoint(), self.secrets.metagraph_url.clone());
        info!(endpoint = subtensor.endpoint(), netuid, "Syncing metagraph");
        let cache = MetagraphCache::new(state_dir.join("metagraph.json"));
        let metagraph = sync_metagraph(&subtensor, &cache, netuid).await?;

        let Some(uid) = metagraph.uid_of(&wallet.hotkey) else {
            bail!(
                "Your miner: {wallet} is not registered to chain connection: {}. \
                 Run btcli wallet register and try again.",
                subtensor.endpoint()
            );
        };
        info!(uid, "Running miner");
        let metagraph: SharedMetagraph = Arc::new(RwLock::new(metagraph));

        let keywords = Arc::new(KeywordPool::load(&self.cli.keywords)?);
        info!(count = keywords.len(), "Loaded fallback keywords");
        let updates = UpdateMonitor::new(self.cli.auto_update_enabled());

        let ctx = PluginContext {
            metagraph: metagraph.clone(),
            hotkey: wallet.hotkey.clone(),
            uid: Some(uid),
            keywords,
            updates: updates.clone(),
            gate: self.config.gate.clone(),
            query_limit: self.config.queries.limit,
        };
        let runner: Arc<dyn ActorRunner> =
            Arc::new(ApifyClient::new(self.secrets.apify_api_key.clone()));
        let registry = Arc::new(build_registry(ctx, runner, &self.config.queries).await?);

        // Result pipeline: workers -> outputs queues -> dispatch -> storage
        let transport: Arc<dyn Transport> = Arc::new(MemoryTransport::new());
        let bus: Arc<dyn MessageBus> = Arc::new(TransportBus::new(transport.clone()));
        let served = Arc::new(AtomicU64::new(0));
        {
            let served = served.clone();
            bus.subscribe(
                SERVED_TOPIC,
                Arc::new(move |_announcement: String| {
                    let served = served.clone();
                    async move {
                        served.fetch_add(1, Ordering::Relaxed);
                    }
                    .boxed()
                }),
            )
            .await?;
        }

        let batcher = self.build_batcher()?;
        let mut tasks = axon::spawn_workers(registry.clone(), self.config.axon.workers_per_plugin);
        for kind in registry.kinds() {
            let mut middleware: DispatchMiddleware<CompletedScrape> =
                DispatchMiddleware::new(transport.clone(), results_topic(kind));
            if let Some(batcher) = &batcher {
                middleware = middleware.with_handler(batcher.clone());
            }
            tasks.push(axon::drain_outputs(
                kind,
                registry.get_plugin_queues(kind)?,
                Arc::new(middleware),
                bus.clone(),
            ));
        }
        if let Some(batcher) = &batcher {
            tasks.push(spawn_flusher(
                batcher.clone(),
                self.config.storage.flush_interval(),
            ));
        }

        let server = self
            .serve_axon(registry.clone(), &wallet, subtensor.endpoint())
            .await?;

        let outcome = self
            .main_loop(&subtensor, &cache, &metagraph, uid, &updates, &served)
            .await;

        // Stop taking work, let in-flight requests finish, then persist
        // whatever is still batched.
        updates.schedule();
        server.shutdown.notify_one();
        if tokio::time::timeout(SHUTDOWN_GRACE, server.handle).await.is_err() {
            warn!("Axon did not stop within the grace period");
        }
        for task in &tasks {
            task.abort();
        }
        if let Some(batcher) = batcher {
            batcher.flush_all().await;
        }
        info!("Miner stopped");
        outcome
    }

    fn build_batcher(&self) -> Result<Option<Arc<ResultBatcher>>> {
        if !self.config.storage.enabled {
            info!("Result storage disabled");
            return Ok(None);
        }
        let Some((endpoint, key_id, secret)) = self.secrets.storage_credentials() else {
            warn!("Object storage credentials not set, results will not be stored");
            return Ok(None);
        };
        let store = Arc::new(S3Store::new(
            endpoint,
            key_id,
            secret,
            &self.secrets.wasabi_region,
        )?);

        let indexer: Arc<dyn Indexer> = match (
            &self.secrets.indexing_api_url,
            &self.secrets.indexing_api_key,
        ) {
            (Some(url), Some(key)) => Arc::new(HttpIndexer::new(url.clone(), key.clone())),
            _ => {
                warn!("Indexing API not configured, stored files will not be indexed");
                Arc::new(NoopIndexer)
            }
        };

        Ok(Some(Arc::new(ResultBatcher::new(
            Arc::new(BatchStore::new(store, indexer)),
            self.config.storage.batch_size,
        ))))
    }

    async fn serve_axon(
        &self,
        registry: Arc<PluginRegistry>,
        wallet: &Wallet,
        endpoint: &str,
    ) -> Result<AxonServer> {
        let state = Arc::new(AxonState {
            registry,
            info: TerminalInfo {
                hotkey: Some(wallet.hotkey.clone()),
                ip: Some(self.cli.axon_ip.clone()),
                port: Some(self.cli.axon_port),
                uuid: Some(Uuid::new_v4().to_string()),
                version: Some(version_code(&Version::current())),
                ..Default::default()
            },
            default_timeout: self.config.axon.default_timeout(),
        });

        let addr = format!("{}:{}", self.cli.axon_ip, self.cli.axon_port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding axon to {addr}"))?;
        info!(
            %addr,
            endpoint,
            netuid = self.cli.netuid,
            "Serving axon"
        );

        let shutdown = Arc::new(Notify::new());
        let signal = shutdown.clone();
        let app = axon::router(state);
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.notified().await })
                .await
            {
                error!(error = %e, "Axon server failed");
            }
        });

        Ok(AxonServer { shutdown, handle })
    }

    async fn main_loop(
        &self,
        subtensor: &SubtensorClient,
        cache: &MetagraphCache,
        metagraph: &SharedMetagraph,
        uid: u16,
        updates: &UpdateMonitor,
        served: &AtomicU64,
    ) -> Result<()> {
        let mut ticker = tokio::time::interval(STEP);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut step: u64 = 0;

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Miner killed by keyboard interrupt.");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    if updates.is_scheduled() {
                        info!("Newer version reported by a validator, exiting for update");
                        return Ok(());
                    }
                    if step % STATUS_INTERVAL_STEPS == 0 {
                        match sync_metagraph(subtensor, cache, self.cli.netuid).await {
                            Ok(fresh) => self.replace_metagraph(metagraph, fresh, uid).await,
                            Err(e) => error!(error = %e, "Metagraph sync failed"),
                        }
                        let graph = metagraph.read().await;
                        if let Some(stats) = graph.neuron_stats(uid) {
                            info!(
                                served = served.load(Ordering::Relaxed),
                                "{}",
                                status_line(step, graph.block, &stats)
                            );
                        }
                    }
                    step += 1;
                }
            }
        }
    }

    async fn replace_metagraph(&self, metagraph: &SharedMetagraph, fresh: Metagraph, uid: u16) {
        if fresh.hotkeys.get(uid as usize) != metagraph.read().await.hotkeys.get(uid as usize) {
            warn!(uid, "Hotkey at our uid changed; this miner may have been deregistered");
        }
        *metagraph.write().await = fresh;
    }
}

struct AxonServer {
    shutdown: Arc<Notify>,
    handle: JoinHandle<()>,
}

fn spawn_flusher(batcher: Arc<ResultBatcher>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // first tick fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            batcher.flush_all().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::QueryProvider;
    use crate::testing::context;

    #[test]
    fn status_line_lists_every_stat() {
        let stats = NeuronStats {
            stake: 12.5,
            rank: 0.1,
            trust: 0.2,
            consensus: 0.3,
            incentive: 0.004,
            emission: 0.005,
        };
        assert_eq!(
            status_line(60, 1234, &stats),
            "Step:60 | Block:1234 | Stake:12.5000 | Rank:0.1000 | Trust:0.2000 | \
             Consensus:0.300000 | Incentive:0.004000 | Emission:0.005000"
        );
    }

    #[test]
    fn version_code_packs_parts() {
        assert_eq!(version_code(&Version::new(1, 2, 3)), 123);
        assert_eq!(version_code(&Version::default()), 0);
    }

    #[tokio::test]
    async fn registry_serves_both_kinds() {
        let runner: Arc<dyn ActorRunner> =
            Arc::new(crate::queries::testing::CannedRunner::default());
        let registry = build_registry(context(&[]), runner, &QueriesConfig::default())
            .await
            .unwrap();
        assert_eq!(registry.kinds(), vec![QueryType::Twitter, QueryType::Reddit]);
    }

    #[tokio::test]
    async fn mismatched_providers_fail_registration() {
        let runner: Arc<dyn ActorRunner> =
            Arc::new(crate::queries::testing::CannedRunner::default());
        let queries = QueriesConfig {
            twitter: QueryProvider::RedditScraper,
            ..Default::default()
        };
        assert!(build_registry(context(&[]), runner, &queries).await.is_err());
    }
}
