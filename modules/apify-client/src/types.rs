use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Apify actor run metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunData {
    pub fn is_terminal_failure(&self) -> bool {
        matches!(self.status.as_str(), "FAILED" | "ABORTED" | "TIMED-OUT")
    }
}

/// A start URL entry, shared by actors that accept `startUrls`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StartUrl {
    pub url: String,
}

/// Proxy settings understood by Apify-hosted actors.
#[derive(Debug, Clone, Serialize)]
pub struct ProxyConfig {
    #[serde(rename = "useApifyProxy")]
    pub use_apify_proxy: bool,
    #[serde(rename = "apifyProxyGroups", skip_serializing_if = "Vec::is_empty")]
    pub apify_proxy_groups: Vec<String>,
}

impl ProxyConfig {
    pub fn apify() -> Self {
        Self {
            use_apify_proxy: true,
            apify_proxy_groups: Vec::new(),
        }
    }

    pub fn residential() -> Self {
        Self {
            use_apify_proxy: true,
            apify_proxy_groups: vec!["RESIDENTIAL".to_string()],
        }
    }
}

// --- Tweet scraper (actor 2s3kSMq7tpuC3bI6M) ---

/// Input for the tweet-scraper actor. Every filter is switched off so the
/// search returns whatever matches `searchQueries`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TweetScraperInput {
    pub exclude_images: bool,
    pub exclude_links: bool,
    pub exclude_media: bool,
    pub exclude_native_retweets: bool,
    pub exclude_native_video: bool,
    pub exclude_news: bool,
    pub exclude_pro_video: bool,
    pub exclude_quote: bool,
    pub exclude_replies: bool,
    pub exclude_safe: bool,
    pub exclude_verified: bool,
    pub exclude_videos: bool,
    pub images: bool,
    pub include_user_id: bool,
    pub include_user_info: bool,
    pub language: String,
    pub links: bool,
    pub media: bool,
    pub native_retweets: bool,
    pub native_video: bool,
    pub news: bool,
    pub pro_video: bool,
    pub proxy_config: ProxyConfig,
    pub quote: bool,
    pub replies: bool,
    pub safe: bool,
    pub search_queries: Vec<String>,
    pub tweets_desired: u32,
    pub verified: bool,
    pub videos: bool,
}

impl TweetScraperInput {
    pub fn search(search_queries: Vec<String>, tweets_desired: u32) -> Self {
        Self {
            exclude_images: false,
            exclude_links: false,
            exclude_media: false,
            exclude_native_retweets: false,
            exclude_native_video: false,
            exclude_news: false,
            exclude_pro_video: false,
            exclude_quote: false,
            exclude_replies: false,
            exclude_safe: false,
            exclude_verified: false,
            exclude_videos: false,
            images: false,
            include_user_id: true,
            include_user_info: true,
            language: "any".to_string(),
            links: false,
            media: false,
            native_retweets: false,
            native_video: false,
            news: false,
            pro_video: false,
            proxy_config: ProxyConfig::residential(),
            quote: false,
            replies: false,
            safe: false,
            search_queries,
            tweets_desired,
            verified: false,
            videos: false,
        }
    }
}

/// A single tweet from the tweet-scraper dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTweet {
    #[serde(default, deserialize_with = "string_or_number")]
    pub tweet_id: Option<String>,
    pub url: Option<String>,
    pub text: Option<String>,
    pub likes: Option<i64>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    pub timestamp: Option<String>,
    pub username: Option<String>,
    #[serde(default)]
    pub hashtags: Option<Vec<String>>,
}

// --- Reddit scrapers (actors FgJtjDwJCLhRH9saM and oAuCIx3ItNrs2okjQ) ---

/// Input shared by the full and lite Reddit scraper actors.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedditScraperInput {
    pub debug_mode: bool,
    pub max_comments: u32,
    pub max_communities_count: u32,
    pub max_items: u32,
    pub max_post_count: u32,
    pub max_user_count: u32,
    pub proxy: ProxyConfig,
    pub scroll_timeout: u32,
    pub search_comments: bool,
    pub search_communities: bool,
    pub search_posts: bool,
    pub search_users: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub searches: Vec<String>,
    pub skip_comments: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub start_urls: Vec<StartUrl>,
}

impl RedditScraperInput {
    /// Keyword search over posts.
    pub fn search(searches: Vec<String>, max_items: u32) -> Self {
        Self {
            debug_mode: false,
            max_comments: max_items,
            max_communities_count: 2,
            max_items,
            max_post_count: max_items,
            max_user_count: 2,
            proxy: ProxyConfig::apify(),
            scroll_timeout: 40,
            search_comments: false,
            search_communities: false,
            search_posts: true,
            search_users: false,
            searches,
            skip_comments: false,
            start_urls: Vec::new(),
        }
    }

    /// Fetch a single post by URL.
    pub fn by_url(url: String) -> Self {
        Self {
            debug_mode: false,
            max_comments: 1,
            max_communities_count: 1,
            max_items: 1,
            max_post_count: 1,
            max_user_count: 1,
            proxy: ProxyConfig::apify(),
            scroll_timeout: 40,
            search_comments: false,
            search_communities: false,
            search_posts: true,
            search_users: false,
            searches: Vec::new(),
            skip_comments: false,
            start_urls: vec![StartUrl { url }],
        }
    }
}

/// A single Reddit item (post, comment or community) from the dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRedditItem {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    pub url: Option<String>,
    pub body: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "upVotes")]
    pub up_votes: Option<i64>,
    /// Apify returns "community", "post", or "comment".
    #[serde(rename = "dataType")]
    pub data_type: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
    #[serde(rename = "communityName")]
    pub community_name: Option<String>,
    pub username: Option<String>,
    #[serde(rename = "parentId")]
    pub parent_id: Option<String>,
    #[serde(rename = "numberOfComments")]
    pub number_of_comments: Option<i64>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// Dataset ids arrive as strings from some actors and as numbers from others.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
