//! Scrape queries: the scraping-platform actors behind each source.

mod reddit;
mod tweets;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use apify_client::{ApifyClient, RawRedditItem, RawTweet};
use scraping_common::{QueryType, ScrapingError};

pub use reddit::{RedditQuery, RedditRecord};
pub use tweets::{TweetQuery, TweetRecord};

/// Which actor serves a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryProvider {
    TweetScraper,
    RedditScraper,
    RedditScraperLite,
}

impl QueryProvider {
    pub fn actor_id(&self) -> &'static str {
        match self {
            QueryProvider::TweetScraper => apify_client::TWEET_SCRAPER,
            QueryProvider::RedditScraper => apify_client::REDDIT_SCRAPER,
            QueryProvider::RedditScraperLite => apify_client::REDDIT_SCRAPER_LITE,
        }
    }

    pub fn query_type(&self) -> QueryType {
        match self {
            QueryProvider::TweetScraper => QueryType::Twitter,
            QueryProvider::RedditScraper | QueryProvider::RedditScraperLite => QueryType::Reddit,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            QueryProvider::TweetScraper => "tweet-scraper",
            QueryProvider::RedditScraper => "reddit-scraper",
            QueryProvider::RedditScraperLite => "reddit-scraper-lite",
        }
    }
}

impl fmt::Display for QueryProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QueryProvider {
    type Err = ScrapingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "tweet-scraper" => Ok(QueryProvider::TweetScraper),
            "reddit-scraper" => Ok(QueryProvider::RedditScraper),
            "reddit-scraper-lite" => Ok(QueryProvider::RedditScraperLite),
            other => Err(ScrapingError::Config(format!("unknown query provider: {other}"))),
        }
    }
}

/// Who asked, for logging alongside the actor run.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    pub validator_key: Option<String>,
    pub validator_version: Option<String>,
    pub miner_uid: Option<u16>,
}

/// Runs scraping actors. Implemented by [`ApifyClient`]; tests substitute
/// canned datasets.
#[async_trait]
pub trait ActorRunner: Send + Sync {
    async fn search_tweets(&self, queries: &[String], limit: u32) -> Result<Vec<RawTweet>>;
    async fn search_reddit(
        &self,
        actor_id: &str,
        searches: &[String],
        limit: u32,
    ) -> Result<Vec<RawRedditItem>>;
    async fn reddit_by_url(&self, actor_id: &str, url: &str) -> Result<Vec<RawRedditItem>>;
}

#[async_trait]
impl ActorRunner for ApifyClient {
    async fn search_tweets(&self, queries: &[String], limit: u32) -> Result<Vec<RawTweet>> {
        Ok(ApifyClient::search_tweets(self, queries, limit).await?)
    }

    async fn search_reddit(
        &self,
        actor_id: &str,
        searches: &[String],
        limit: u32,
    ) -> Result<Vec<RawRedditItem>> {
        Ok(ApifyClient::search_reddit(self, actor_id, searches, limit).await?)
    }

    async fn reddit_by_url(&self, actor_id: &str, url: &str) -> Result<Vec<RawRedditItem>> {
        Ok(ApifyClient::reddit_by_url(self, actor_id, url).await?)
    }
}

#[async_trait]
pub trait ScrapeQuery: Send + Sync {
    fn provider(&self) -> QueryProvider;

    /// Run a keyword search and return normalized records.
    async fn execute(
        &self,
        search_keys: &[String],
        limit: u32,
        ctx: &QueryContext,
    ) -> Result<Vec<Value>>;

    /// Fetch a single item by URL. Only some providers support this.
    async fn search_by_url(&self, url: &str) -> Result<Vec<Value>> {
        Err(ScrapingError::Scraping(format!(
            "{} does not support search by url (requested {url})",
            self.provider()
        ))
        .into())
    }
}

/// Build the query for `kind` backed by `provider`.
pub fn get_query(
    kind: QueryType,
    provider: QueryProvider,
    runner: Arc<dyn ActorRunner>,
) -> Result<Box<dyn ScrapeQuery>, ScrapingError> {
    if provider.query_type() != kind {
        return Err(ScrapingError::Config(format!(
            "query provider {provider} cannot serve {kind}"
        )));
    }
    Ok(match provider {
        QueryProvider::TweetScraper => Box::new(TweetQuery::new(runner)),
        QueryProvider::RedditScraper | QueryProvider::RedditScraperLite => {
            Box::new(RedditQuery::new(runner, provider))
        }
    })
}
