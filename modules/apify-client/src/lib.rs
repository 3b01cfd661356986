pub mod error;
pub mod types;

pub use error::{ApifyError, Result};
pub use types::{
    ProxyConfig, RawRedditItem, RawTweet, RedditScraperInput, RunData, StartUrl,
    TweetScraperInput,
};

use serde::de::DeserializeOwned;
use serde::Serialize;
use types::ApiResponse;

const BASE_URL: &str = "https://api.apify.com/v2";

/// Actor ID for the tweet scraper.
pub const TWEET_SCRAPER: &str = "2s3kSMq7tpuC3bI6M";

/// Actor ID for the full Reddit scraper.
pub const REDDIT_SCRAPER: &str = "FgJtjDwJCLhRH9saM";

/// Actor ID for the lite Reddit scraper.
pub const REDDIT_SCRAPER_LITE: &str = "oAuCIx3ItNrs2okjQ";

pub struct ApifyClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl ApifyClient {
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, BASE_URL.to_string())
    }

    /// Point the client at a different API root (proxies, local fakes).
    pub fn with_base_url(token: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Start an actor run. Returns immediately with run metadata.
    pub async fn start_run<I: Serialize + ?Sized>(
        &self,
        actor_id: &str,
        input: &I,
    ) -> Result<RunData> {
        let url = format!("{}/acts/{}/runs", self.base_url, actor_id);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(input)
            .send()
            .await?;

        let resp = check_status(resp).await?;
        let api_resp: ApiResponse<RunData> = resp.json().await?;
        Ok(api_resp.data)
    }

    /// Poll until a run completes. Uses `waitForFinish=60` for efficient long-polling.
    pub async fn wait_for_run(&self, run_id: &str) -> Result<RunData> {
        loop {
            let url = format!("{}/actor-runs/{}?waitForFinish=60", self.base_url, run_id);
            let resp = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await?;

            let resp = check_status(resp).await?;
            let api_resp: ApiResponse<RunData> = resp.json().await?;
            let run = api_resp.data;
            if run.status == "SUCCEEDED" {
                return Ok(run);
            }
            if run.is_terminal_failure() {
                return Err(ApifyError::RunFailed {
                    run_id: run.id,
                    status: run.status,
                });
            }
            tracing::debug!(run_id, status = %run.status, "Run still in progress");
        }
    }

    /// Fetch dataset items from a completed run.
    pub async fn get_dataset_items<T: DeserializeOwned>(&self, dataset_id: &str) -> Result<Vec<T>> {
        let url = format!("{}/datasets/{}/items?format=json", self.base_url, dataset_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let resp = check_status(resp).await?;
        let items: Vec<T> = resp.json().await?;
        Ok(items)
    }

    /// Run an actor end-to-end: start run, poll, fetch results.
    pub async fn run_actor<I, T>(&self, actor_id: &str, input: &I) -> Result<Vec<T>>
    where
        I: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let run = self.start_run(actor_id, input).await?;
        tracing::info!(actor_id, run_id = %run.id, "Apify run started, polling for completion");

        let completed = self.wait_for_run(&run.id).await?;
        tracing::info!(
            run_id = %completed.id,
            dataset_id = %completed.default_dataset_id,
            "Run completed, fetching results"
        );

        let items: Vec<T> = self.get_dataset_items(&completed.default_dataset_id).await?;
        tracing::info!(actor_id, count = items.len(), "Fetched dataset items");
        Ok(items)
    }

    /// Search tweets by keyword through the tweet scraper actor.
    pub async fn search_tweets(&self, queries: &[String], limit: u32) -> Result<Vec<RawTweet>> {
        tracing::info!(?queries, limit, "Starting tweet search");
        let input = TweetScraperInput::search(queries.to_vec(), limit);
        self.run_actor(TWEET_SCRAPER, &input).await
    }

    /// Search Reddit posts by keyword through one of the Reddit actors.
    pub async fn search_reddit(
        &self,
        actor_id: &str,
        searches: &[String],
        limit: u32,
    ) -> Result<Vec<RawRedditItem>> {
        tracing::info!(actor_id, ?searches, limit, "Starting Reddit search");
        let input = RedditScraperInput::search(searches.to_vec(), limit);
        self.run_actor(actor_id, &input).await
    }

    /// Fetch a single Reddit post by URL.
    pub async fn reddit_by_url(&self, actor_id: &str, url: &str) -> Result<Vec<RawRedditItem>> {
        tracing::info!(actor_id, url, "Fetching Reddit post by url");
        let input = RedditScraperInput::by_url(url.to_string());
        self.run_actor(actor_id, &input).await
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ApifyError::Api {
        status: status.as_u16(),
        message: body,
    })
}
