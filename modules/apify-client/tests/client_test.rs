//! ApifyClient against a local fake of the Apify REST API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use apify_client::{ApifyClient, ApifyError, RawTweet, TWEET_SCRAPER};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

#[derive(Default)]
struct FakeApify {
    polls: AtomicUsize,
    fail_run: bool,
}

async fn start_run(
    Path(actor): Path<String>,
    Json(input): Json<serde_json::Value>,
) -> impl IntoResponse {
    if actor != TWEET_SCRAPER {
        return (StatusCode::NOT_FOUND, "unknown actor").into_response();
    }
    assert_eq!(input["searchQueries"][0], "bittensor");
    Json(json!({"data": {"id": "run-1", "status": "READY", "defaultDatasetId": "ds-1"}}))
        .into_response()
}

async fn poll_run(
    State(fake): State<Arc<FakeApify>>,
    Path(run): Path<String>,
) -> impl IntoResponse {
    let n = fake.polls.fetch_add(1, Ordering::SeqCst);
    let status = match (fake.fail_run, n) {
        (true, _) => "FAILED",
        (false, 0) => "RUNNING",
        _ => "SUCCEEDED",
    };
    Json(json!({"data": {"id": run, "status": status, "defaultDatasetId": "ds-1"}}))
}

async fn dataset_items(Path(ds): Path<String>) -> impl IntoResponse {
    assert_eq!(ds, "ds-1");
    Json(json!([
        {"tweet_id": "1", "url": "https://x.com/a/status/1", "text": "hello", "likes": 4,
         "images": [], "timestamp": "2024-01-01T00:00:00Z"},
        {"tweet_id": 2, "url": "https://x.com/b/status/2", "text": "world", "likes": 0,
         "images": ["https://img"], "timestamp": "2024-01-02T00:00:00Z", "username": "b"}
    ]))
}

async fn spawn_fake(fake: Arc<FakeApify>) -> String {
    let app = Router::new()
        .route("/acts/{actor}/runs", post(start_run))
        .route("/actor-runs/{run}", get(poll_run))
        .route("/datasets/{ds}/items", get(dataset_items))
        .with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn search_tweets_polls_until_success_and_reads_dataset() {
    let fake = Arc::new(FakeApify::default());
    let base = spawn_fake(fake.clone()).await;
    let client = ApifyClient::with_base_url("token".into(), base);

    let tweets: Vec<RawTweet> = client
        .search_tweets(&["bittensor".to_string()], 10)
        .await
        .unwrap();

    assert_eq!(tweets.len(), 2);
    assert_eq!(tweets[1].tweet_id.as_deref(), Some("2"));
    assert_eq!(tweets[1].username.as_deref(), Some("b"));
    assert_eq!(fake.polls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failed_run_is_reported() {
    let fake = Arc::new(FakeApify {
        fail_run: true,
        ..Default::default()
    });
    let base = spawn_fake(fake).await;
    let client = ApifyClient::with_base_url("token".into(), base);

    let err = client
        .search_tweets(&["bittensor".to_string()], 10)
        .await
        .unwrap_err();

    match err {
        ApifyError::RunFailed { run_id, status } => {
            assert_eq!(run_id, "run-1");
            assert_eq!(status, "FAILED");
        }
        other => panic!("expected RunFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_actor_surfaces_api_error() {
    let base = spawn_fake(Arc::new(FakeApify::default())).await;
    let client = ApifyClient::with_base_url("token".into(), base);

    let err = client
        .start_run("nope", &json!({"searchQueries": ["bittensor"]}))
        .await
        .unwrap_err();

    assert!(matches!(err, ApifyError::Api { status: 404, .. }));
}
