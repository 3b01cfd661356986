use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::extract::Query;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use scraping_miner::metagraph::{
    sync_metagraph, Metagraph, MetagraphCache, Subtensor, SubtensorClient,
};

struct FakeChain {
    head: AtomicU64,
    snapshot_block: AtomicU64,
    fetches: AtomicUsize,
}

impl FakeChain {
    fn new(head: u64, snapshot_block: u64) -> Self {
        Self {
            head: AtomicU64::new(head),
            snapshot_block: AtomicU64::new(snapshot_block),
            fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Subtensor for FakeChain {
    async fn block(&self) -> Result<u64> {
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn metagraph(&self, netuid: u16) -> Result<Metagraph> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(graph(netuid, self.snapshot_block.load(Ordering::SeqCst)))
    }
}

fn graph(netuid: u16, block: u64) -> Metagraph {
    Metagraph {
        netuid,
        block,
        hotkeys: vec!["5Miner".into()],
        stake: vec![1.0],
        ..Default::default()
    }
}

#[tokio::test]
async fn empty_cache_fetches_and_saves() {
    let dir = tempfile::tempdir().unwrap();
    let cache = MetagraphCache::new(dir.path().join("metagraph.json"));
    let chain = FakeChain::new(100, 100);

    let g = sync_metagraph(&chain, &cache, 3).await.unwrap();

    assert_eq!(g.block, 100);
    assert_eq!(chain.fetches.load(Ordering::SeqCst), 1);
    assert_eq!(cache.load().await.unwrap(), g);
}

#[tokio::test]
async fn recent_cache_is_reused() {
    let dir = tempfile::tempdir().unwrap();
    let cache = MetagraphCache::new(dir.path().join("metagraph.json"));
    cache.save(&graph(3, 100)).await.unwrap();
    let chain = FakeChain::new(105, 105);

    let g = sync_metagraph(&chain, &cache, 3).await.unwrap();

    assert_eq!(g.block, 100);
    assert_eq!(chain.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stale_cache_is_resynced() {
    let dir = tempfile::tempdir().unwrap();
    let cache = MetagraphCache::new(dir.path().join("metagraph.json"));
    cache.save(&graph(3, 100)).await.unwrap();
    let chain = FakeChain::new(106, 106);

    let g = sync_metagraph(&chain, &cache, 3).await.unwrap();

    assert_eq!(g.block, 106);
    assert_eq!(chain.fetches.load(Ordering::SeqCst), 1);
    assert_eq!(cache.load().await.unwrap().block, 106);
}

#[tokio::test]
async fn cache_for_another_subnet_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let cache = MetagraphCache::new(dir.path().join("metagraph.json"));
    cache.save(&graph(7, 100)).await.unwrap();
    let chain = FakeChain::new(100, 100);

    let g = sync_metagraph(&chain, &cache, 3).await.unwrap();

    assert_eq!(g.netuid, 3);
    assert_eq!(chain.fetches.load(Ordering::SeqCst), 1);
}

async fn rpc(Json(req): Json<Value>) -> Json<Value> {
    assert_eq!(req["method"], "chain_getHeader");
    Json(json!({"jsonrpc": "2.0", "id": req["id"], "result": {"number": "0x1f4"}}))
}

async fn snapshot(Query(params): Query<std::collections::HashMap<String, String>>) -> Json<Value> {
    let netuid: u16 = params["netuid"].parse().unwrap();
    Json(json!({
        "netuid": netuid, "block": 498, "hotkeys": ["5Val", "5Miner"],
        "S": [10.0, 0.5], "validator_permit": [true, false]
    }))
}

#[tokio::test]
async fn client_reads_block_and_snapshot() {
    let app = Router::new()
        .route("/", post(rpc))
        .route("/metagraph", get(snapshot));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let client = SubtensorClient::new(
        &format!("ws://{addr}"),
        Some(format!("http://{addr}/metagraph")),
    );
    let client: Arc<dyn Subtensor> = Arc::new(client);

    assert_eq!(client.block().await.unwrap(), 500);
    let g = client.metagraph(3).await.unwrap();
    assert_eq!(g.uid_of("5Miner"), Some(1));
    assert_eq!(g.stake, vec![10.0, 0.5]);
    assert!(g.has_validator_permit(0));
}
