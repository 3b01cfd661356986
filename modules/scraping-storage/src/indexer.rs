use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::error::Result;

/// Records uploaded files with the external indexing service.
#[async_trait]
pub trait Indexer: Send + Sync {
    async fn save_indexing_row(
        &self,
        file_name: &str,
        source_type: &str,
        row_count: usize,
        search_keys: &[String],
    ) -> Result<Value>;
}

#[derive(Debug, Serialize)]
struct IndexingRow<'a> {
    file_name: &'a str,
    source_type: &'a str,
    row_count: usize,
    search_keys: &'a [String],
    api_key: &'a str,
}

/// Indexing API over HTTP.
pub struct HttpIndexer {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpIndexer {
    pub fn new(url: String, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            api_key,
        }
    }
}

#[async_trait]
impl Indexer for HttpIndexer {
    async fn save_indexing_row(
        &self,
        file_name: &str,
        source_type: &str,
        row_count: usize,
        search_keys: &[String],
    ) -> Result<Value> {
        let row = IndexingRow {
            file_name,
            source_type,
            row_count,
            search_keys,
            api_key: &self.api_key,
        };

        let resp = match self.http.post(&self.url).json(&row).send().await {
            Ok(resp) => resp,
            Err(e) if e.is_connect() => {
                error!(error = %e, "Could not connect to indexing API");
                return Ok(Value::Object(Default::default()));
            }
            Err(e) => return Err(e.into()),
        };

        let body: Value = resp.json().await?;
        info!(file_name, source_type, row_count, "Indexed file");
        Ok(body)
    }
}

/// Used when no indexing endpoint is configured.
pub struct NoopIndexer;

#[async_trait]
impl Indexer for NoopIndexer {
    async fn save_indexing_row(
        &self,
        _file_name: &str,
        _source_type: &str,
        _row_count: usize,
        _search_keys: &[String],
    ) -> Result<Value> {
        Ok(Value::Object(Default::default()))
    }
}
