use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use apify_client::RawTweet;

use super::{ActorRunner, QueryContext, QueryProvider, ScrapeQuery};

/// A tweet as returned to validators and written to storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TweetRecord {
    pub id: String,
    pub url: Option<String>,
    pub text: Option<String>,
    pub likes: Option<i64>,
    pub images: Vec<String>,
    pub timestamp: Option<String>,
    pub username: Option<String>,
    pub hashtags: Vec<String>,
}

impl TweetRecord {
    /// Items without an id cannot be deduplicated and are dropped.
    fn from_raw(raw: RawTweet) -> Option<Self> {
        Some(Self {
            id: raw.tweet_id?,
            url: raw.url,
            text: raw.text,
            likes: raw.likes,
            images: raw.images.unwrap_or_default(),
            timestamp: raw.timestamp,
            username: raw.username,
            hashtags: raw.hashtags.unwrap_or_default(),
        })
    }
}

pub struct TweetQuery {
    runner: Arc<dyn ActorRunner>,
}

impl TweetQuery {
    pub fn new(runner: Arc<dyn ActorRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl ScrapeQuery for TweetQuery {
    fn provider(&self) -> QueryProvider {
        QueryProvider::TweetScraper
    }

    async fn execute(
        &self,
        search_keys: &[String],
        limit: u32,
        ctx: &QueryContext,
    ) -> Result<Vec<Value>> {
        info!(
            ?search_keys,
            limit,
            validator = ctx.validator_key.as_deref().unwrap_or("unknown"),
            validator_version = ctx.validator_version.as_deref().unwrap_or("unknown"),
            miner_uid = ?ctx.miner_uid,
            "Running tweet search"
        );

        let raw = self.runner.search_tweets(search_keys, limit).await?;
        let fetched = raw.len();
        let records: Vec<TweetRecord> = raw.into_iter().filter_map(TweetRecord::from_raw).collect();
        if records.len() < fetched {
            warn!(dropped = fetched - records.len(), "Dropped tweets without an id");
        }

        records
            .iter()
            .map(|r| serde_json::to_value(r).map_err(Into::into))
            .collect()
    }
}
