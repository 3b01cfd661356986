use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tower::ServiceExt;

use scraping_common::{QueryType, Version};
use scraping_miner::axon::{router, spawn_workers, AxonState};
use scraping_miner::config::GateConfig;
use scraping_miner::keywords::KeywordPool;
use scraping_miner::metagraph::Metagraph;
use scraping_miner::plugin::PluginContext;
use scraping_miner::queries::{QueryContext, QueryProvider, ScrapeQuery};
use scraping_miner::registry::PluginRegistry;
use scraping_miner::sources::ScrapeSource;
use scraping_miner::synapse::TerminalInfo;
use scraping_miner::update::UpdateMonitor;

struct OneTweetPerKey;

#[async_trait]
impl ScrapeQuery for OneTweetPerKey {
    fn provider(&self) -> QueryProvider {
        QueryProvider::TweetScraper
    }

    async fn execute(&self, keys: &[String], _: u32, _: &QueryContext) -> Result<Vec<Value>> {
        Ok(keys
            .iter()
            .map(|k| json!({"id": format!("id-{k}"), "text": k}))
            .collect())
    }
}

struct Failing;

#[async_trait]
impl ScrapeQuery for Failing {
    fn provider(&self) -> QueryProvider {
        QueryProvider::RedditScraperLite
    }

    async fn execute(&self, _: &[String], _: u32, _: &QueryContext) -> Result<Vec<Value>> {
        anyhow::bail!("actor run failed")
    }
}

struct Slow;

#[async_trait]
impl ScrapeQuery for Slow {
    fn provider(&self) -> QueryProvider {
        QueryProvider::RedditScraper
    }

    async fn execute(&self, _: &[String], _: u32, _: &QueryContext) -> Result<Vec<Value>> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(vec![])
    }
}

struct PanicsOnBoom;

#[async_trait]
impl ScrapeQuery for PanicsOnBoom {
    fn provider(&self) -> QueryProvider {
        QueryProvider::RedditScraperLite
    }

    async fn execute(&self, keys: &[String], _: u32, _: &QueryContext) -> Result<Vec<Value>> {
        if keys.iter().any(|k| k == "boom") {
            panic!("actor client blew up");
        }
        Ok(vec![json!({"id": "x", "text": "ok"})])
    }
}

async fn app(reddit: Box<dyn ScrapeQuery>) -> (Router, Arc<PluginRegistry>) {
    let metagraph = Metagraph {
        netuid: 3,
        block: 10,
        hotkeys: vec!["5Miner".into(), "5Val".into()],
        stake: vec![0.0, 100.0],
        ..Default::default()
    };
    let ctx = PluginContext {
        metagraph: Arc::new(RwLock::new(metagraph)),
        hotkey: "5Miner".into(),
        uid: Some(0),
        keywords: Arc::new(KeywordPool::from_lines("bittensor")),
        updates: UpdateMonitor::new(false),
        gate: GateConfig::default(),
        query_limit: 15,
    };

    let mut registry = PluginRegistry::new();
    registry
        .register_plugin(
            QueryType::Twitter,
            Arc::new(ScrapeSource::twitter(Box::new(OneTweetPerKey))),
            ctx.clone(),
        )
        .await
        .unwrap();
    registry
        .register_plugin(QueryType::Reddit, Arc::new(ScrapeSource::reddit(reddit)), ctx)
        .await
        .unwrap();
    let registry = Arc::new(registry);
    spawn_workers(registry.clone(), 1);

    let state = Arc::new(AxonState {
        registry: registry.clone(),
        info: TerminalInfo {
            hotkey: Some("5Miner".into()),
            ..Default::default()
        },
        default_timeout: Duration::from_secs(2),
    });
    (router(state), registry)
}

fn post(synapse: &str, caller: &str) -> axum::http::request::Builder {
    Request::builder()
        .method("POST")
        .uri(format!("/{synapse}"))
        .header("content-type", "application/json")
        .header("bt_header_dendrite_hotkey", caller)
}

fn scrape_body(keys: &[&str]) -> Value {
    json!({
        "version": Version::current(),
        "scrap_input": {"search_key": keys},
    })
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

#[tokio::test]
async fn health_check_responds() {
    let (app, _) = app(Box::new(Failing)).await;
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn serves_registered_validator() {
    let (app, registry) = app(Box::new(Failing)).await;
    let body = scrape_body(&["tao", "subnet"]);
    let request = post("TwitterScrap", "5Val")
        .body(Body::from(body.to_string()))
        .unwrap();

    let (status, headers, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["bt_header_axon_status_code"], "200");
    assert_eq!(headers["bt_header_axon_status_message"], "Success");
    assert_eq!(headers["bt_header_axon_hotkey"], "5Miner");
    assert!(headers.contains_key("bt_header_axon_process_time"));
    assert_eq!(body["scrap_output"].as_array().unwrap().len(), 2);
    assert_eq!(body["scrap_output"][0]["id"], "id-tao");

    let queues = registry.get_plugin_queues(QueryType::Twitter).unwrap();
    let completed = queues.outputs.try_get().await.unwrap();
    assert_eq!(completed.caller.as_deref(), Some("5Val"));
    assert_eq!(completed.search_keys, vec!["tao".to_string(), "subnet".to_string()]);
}

#[tokio::test]
async fn unknown_synapse_is_not_found() {
    let (app, _) = app(Box::new(Failing)).await;
    let request = post("MastodonScrap", "5Val")
        .body(Body::empty())
        .unwrap();

    let (status, headers, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(headers["bt_header_axon_status_code"], "404");
}

#[tokio::test]
async fn unregistered_caller_is_forbidden() {
    let (app, _) = app(Box::new(Failing)).await;
    let request = post("TwitterScrap", "5Stranger")
        .body(Body::from(scrape_body(&["tao"]).to_string()))
        .unwrap();

    let (status, headers, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        headers["bt_header_axon_status_message"],
        "Forbidden. Key is blacklisted: Unrecognized hotkey."
    );
    assert!(body["scrap_output"].is_null());
}

#[tokio::test]
async fn replayed_nonce_is_unauthorized() {
    let (app, _) = app(Box::new(Failing)).await;
    let request = || {
        post("TwitterScrap", "5Val")
            .header("bt_header_dendrite_nonce", "7")
            .body(Body::from(scrape_body(&["tao"]).to_string()))
            .unwrap()
    };

    let (first, _, _) = send(&app, request()).await;
    let (second, _, _) = send(&app, request()).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let (app, _) = app(Box::new(Failing)).await;
    let request = post("TwitterScrap", "5Val")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn forward_error_is_internal_error() {
    let (app, _) = app(Box::new(Failing)).await;
    let request = post("RedditScrap", "5Val")
        .body(Body::from(scrape_body(&["tao"]).to_string()))
        .unwrap();

    let (status, headers, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(headers["bt_header_axon_status_message"]
        .to_str()
        .unwrap()
        .contains("actor run failed"));
}

#[tokio::test]
async fn slow_forward_times_out() {
    let (app, _) = app(Box::new(Slow)).await;
    let request = post("RedditScrap", "5Val")
        .header("timeout", "0.2")
        .body(Body::from(scrape_body(&["tao"]).to_string()))
        .unwrap();

    let (status, headers, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(headers["bt_header_axon_status_code"], "408");
}

#[tokio::test]
async fn oversized_timeout_falls_back_to_default() {
    let (app, _) = app(Box::new(Failing)).await;
    let request = post("TwitterScrap", "5Stranger")
        .header("timeout", "1e300")
        .body(Body::from(scrape_body(&["tao"]).to_string()))
        .unwrap();

    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn worker_survives_panicking_forward() {
    let (app, _) = app(Box::new(PanicsOnBoom)).await;
    let request = |key: &str| {
        post("RedditScrap", "5Val")
            .body(Body::from(scrape_body(&[key]).to_string()))
            .unwrap()
    };

    let (first, _, _) = send(&app, request("boom")).await;
    let (second, _, body) = send(&app, request("tao")).await;

    assert_eq!(first, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(body["scrap_output"][0]["id"], "x");
}
