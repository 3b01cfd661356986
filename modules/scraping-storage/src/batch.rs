// Batch persistence: flatten scraped results, filter, write CSV, index.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{error, info};

use scraping_common::QueryType;

use crate::error::{Result, StorageError};
use crate::indexer::Indexer;
use crate::object_store::ObjectStore;
use crate::{content_hash, csv};

const SCORING_BUCKET: &str = "scoring";

/// Uploads above this status are treated as failed commits.
const MAX_OK_STATUS: u16 = 210;

/// Column layout for one source type.
struct Layout {
    required: &'static [&'static str],
    columns: &'static [&'static str],
}

const TWITTER_LAYOUT: Layout = Layout {
    required: &["id", "url", "text", "likes", "images", "timestamp"],
    columns: &[
        "id", "url", "text", "likes", "images", "timestamp", "username", "hashtags",
    ],
};

const REDDIT_LAYOUT: Layout = Layout {
    required: &["id", "url", "text", "likes", "dataType", "timestamp"],
    columns: &[
        "id",
        "url",
        "text",
        "likes",
        "dataType",
        "timestamp",
        "username",
        "parent",
        "community",
        "title",
        "num_comments",
        "user_id",
    ],
};

pub struct BatchStore {
    store: Arc<dyn ObjectStore>,
    indexer: Arc<dyn Indexer>,
}

impl BatchStore {
    pub fn new(store: Arc<dyn ObjectStore>, indexer: Arc<dyn Indexer>) -> Self {
        Self { store, indexer }
    }

    /// Persist a batch for either source type.
    pub async fn store(
        &self,
        kind: QueryType,
        data: &[Vec<Value>],
        search_keys: &[String],
    ) -> Result<Value> {
        match kind {
            QueryType::Twitter => self.twitter_store(data, search_keys).await,
            QueryType::Reddit => self.reddit_store(data, search_keys).await,
        }
    }

    /// Store filtered tweets as CSV and index the file.
    pub async fn twitter_store(
        &self,
        data: &[Vec<Value>],
        search_keys: &[String],
    ) -> Result<Value> {
        self.store_with_layout(QueryType::Twitter, &TWITTER_LAYOUT, data, search_keys)
            .await
    }

    /// Store filtered Reddit posts as CSV and index the file.
    pub async fn reddit_store(
        &self,
        data: &[Vec<Value>],
        search_keys: &[String],
    ) -> Result<Value> {
        self.store_with_layout(QueryType::Reddit, &REDDIT_LAYOUT, data, search_keys)
            .await
    }

    async fn store_with_layout(
        &self,
        kind: QueryType,
        layout: &Layout,
        data: &[Vec<Value>],
        search_keys: &[String],
    ) -> Result<Value> {
        let source_type = kind.source_type();
        let filename = format!(
            "{source_type}_{}.csv",
            content_hash(serde_json::to_string(data)?.as_bytes())
        );
        let rows = select_rows(data, layout.required);
        if rows.is_empty() {
            return Ok(json!({"msg": "data length is 0"}));
        }

        let body = csv::write_rows(layout.columns, &rows);
        self.write_file_and_index(body, &filename, search_keys, source_type, rows.len())
            .await
    }

    async fn write_file_and_index(
        &self,
        body: String,
        filename: &str,
        search_keys: &[String],
        source_type: &str,
        total_count: usize,
    ) -> Result<Value> {
        let bucket = format!("{source_type}scrapingbucket");
        let key = format!("{source_type}/{filename}");
        info!(total_count, %bucket, %key, "Storing results");

        match self
            .store
            .put_object(&bucket, &key, body.into_bytes(), "text/csv")
            .await
        {
            Ok(put) if put.status > MAX_OK_STATUS => {
                error!(status = put.status, source_type, "Error committing file to object storage");
                return Ok(Value::Object(Default::default()));
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, source_type, "Object storage upload failed");
                return Ok(Value::Object(Default::default()));
            }
        }

        self.indexer
            .save_indexing_row(filename, source_type, total_count, search_keys)
            .await
    }

    /// Write validator scoring metrics to the `scoring` bucket.
    /// `metrics` must carry an integer `block` field.
    pub async fn store_scoring_metrics(&self, metrics: &Value, kind: &str) -> Result<String> {
        let block = metrics
            .get("block")
            .and_then(Value::as_u64)
            .ok_or_else(|| StorageError::Payload("metrics are missing an integer `block`".into()))?;

        let data = serde_json::to_vec(metrics)?;
        let filename = format!("{block:09}_{}.json", content_hash(&data));
        let key = format!("{kind}/{filename}");

        self.store
            .put_object(SCORING_BUCKET, &key, data, "application/json")
            .await?;
        info!(%key, "Stored scoring metrics");
        Ok(key)
    }
}

/// Flatten, drop rows missing a required field, dedupe by `id` (first wins).
fn select_rows<'a>(data: &'a [Vec<Value>], required: &[&str]) -> Vec<&'a Map<String, Value>> {
    let mut seen = HashSet::new();
    data.iter()
        .flatten()
        .filter_map(Value::as_object)
        .filter(|row| {
            required
                .iter()
                .all(|field| row.get(*field).is_some_and(|v| !v.is_null()))
        })
        .filter(|row| seen.insert(row.get("id").map(Value::to_string).unwrap_or_default()))
        .collect()
}
