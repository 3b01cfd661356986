use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use apify_client::RawRedditItem;

use super::{ActorRunner, QueryContext, QueryProvider, ScrapeQuery};

/// A Reddit post or comment as returned to validators and written to storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedditRecord {
    pub id: String,
    pub url: Option<String>,
    pub text: Option<String>,
    pub likes: Option<i64>,
    #[serde(rename = "dataType")]
    pub data_type: Option<String>,
    pub timestamp: Option<String>,
    pub community: Option<String>,
    pub username: Option<String>,
    pub parent: Option<String>,
    pub title: Option<String>,
    pub num_comments: Option<i64>,
    pub user_id: Option<String>,
}

impl RedditRecord {
    /// Posts without a body fall back to their title as text.
    fn from_raw(raw: RawRedditItem) -> Option<Self> {
        let text = raw.body.or_else(|| raw.title.clone());
        Some(Self {
            id: raw.id?,
            url: raw.url,
            text,
            likes: raw.up_votes,
            data_type: raw.data_type,
            timestamp: raw.created_at,
            community: raw.community_name,
            username: raw.username,
            parent: raw.parent_id,
            title: raw.title,
            num_comments: raw.number_of_comments,
            user_id: raw.user_id,
        })
    }
}

fn to_values(raw: Vec<RawRedditItem>) -> Result<Vec<Value>> {
    let fetched = raw.len();
    let records: Vec<RedditRecord> = raw.into_iter().filter_map(RedditRecord::from_raw).collect();
    if records.len() < fetched {
        warn!(dropped = fetched - records.len(), "Dropped reddit items without an id");
    }
    records
        .iter()
        .map(|r| serde_json::to_value(r).map_err(Into::into))
        .collect()
}

/// Serves both the full and the lite Reddit actors.
pub struct RedditQuery {
    runner: Arc<dyn ActorRunner>,
    provider: QueryProvider,
}

impl RedditQuery {
    pub fn new(runner: Arc<dyn ActorRunner>, provider: QueryProvider) -> Self {
        Self { runner, provider }
    }
}

#[async_trait]
impl ScrapeQuery for RedditQuery {
    fn provider(&self) -> QueryProvider {
        self.provider
    }

    async fn execute(
        &self,
        search_keys: &[String],
        limit: u32,
        ctx: &QueryContext,
    ) -> Result<Vec<Value>> {
        info!(
            provider = %self.provider,
            ?search_keys,
            limit,
            validator = ctx.validator_key.as_deref().unwrap_or("unknown"),
            validator_version = ctx.validator_version.as_deref().unwrap_or("unknown"),
            miner_uid = ?ctx.miner_uid,
            "Running reddit search"
        );
        let raw = self
            .runner
            .search_reddit(self.provider.actor_id(), search_keys, limit)
            .await?;
        to_values(raw)
    }

    async fn search_by_url(&self, url: &str) -> Result<Vec<Value>> {
        let raw = self
            .runner
            .reddit_by_url(self.provider.actor_id(), url)
            .await?;
        to_values(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::testing::CannedRunner;
    use serde_json::json;

    fn runner() -> Arc<CannedRunner> {
        Arc::new(CannedRunner {
            reddit: vec![
                json!({
                    "id": "t3_abc", "url": "https://reddit.com/r/bittensor_/abc",
                    "title": "Subnet 3", "upVotes": 12, "dataType": "post",
                    "createdAt": "2024-01-01T00:00:00.000Z", "communityName": "r/bittensor_",
                    "username": "alice", "numberOfComments": 4, "userId": "t2_x"
                }),
                json!({
                    "id": "t1_def", "url": "https://reddit.com/r/bittensor_/abc/def",
                    "body": "nice", "upVotes": 1, "dataType": "comment",
                    "createdAt": "2024-01-01T01:00:00.000Z", "parentId": "t3_abc"
                }),
                json!({"dataType": "community", "title": "no id"}),
            ],
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn maps_posts_and_comments() {
        let runner = runner();
        let query = RedditQuery::new(runner.clone(), QueryProvider::RedditScraper);

        let out = query
            .execute(&["tao".into()], 15, &QueryContext::default())
            .await
            .unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["text"], "Subnet 3");
        assert_eq!(out[0]["likes"], 12);
        assert_eq!(out[0]["dataType"], "post");
        assert_eq!(out[0]["community"], "r/bittensor_");
        assert_eq!(out[0]["num_comments"], 4);
        assert_eq!(out[1]["text"], "nice");
        assert_eq!(out[1]["parent"], "t3_abc");
        assert_eq!(out[1]["timestamp"], "2024-01-01T01:00:00.000Z");

        let calls = runner.calls.lock().await;
        assert_eq!(calls[0].0, apify_client::REDDIT_SCRAPER);
    }

    #[tokio::test]
    async fn lite_provider_uses_lite_actor_for_url_lookup() {
        let runner = runner();
        let query = RedditQuery::new(runner.clone(), QueryProvider::RedditScraperLite);

        let out = query
            .search_by_url("https://reddit.com/r/bittensor_/abc")
            .await
            .unwrap();

        assert_eq!(out.len(), 2);
        let calls = runner.calls.lock().await;
        assert_eq!(calls[0].0, apify_client::REDDIT_SCRAPER_LITE);
        assert_eq!(calls[0].1, vec!["https://reddit.com/r/bittensor_/abc".to_string()]);
    }
}
