//! Collects completed scrapes per kind and hands full batches to storage.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{error, info};

use scraping_common::QueryType;
use scraping_storage::BatchStore;

use crate::bus::Handler;
use crate::registry::CompletedScrape;

#[derive(Default)]
struct Pending {
    data: Vec<Vec<Value>>,
    search_keys: Vec<String>,
}

pub struct ResultBatcher {
    store: Arc<BatchStore>,
    batch_size: usize,
    pending: Mutex<HashMap<QueryType, Pending>>,
}

impl ResultBatcher {
    pub fn new(store: Arc<BatchStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Add a result; writes the batch once it holds `batch_size` results.
    pub async fn push(&self, scrape: CompletedScrape) -> Value {
        let full = {
            let mut pending = self.pending.lock().await;
            let batch = pending.entry(scrape.kind).or_default();
            batch.data.push(scrape.output);
            for key in scrape.search_keys {
                if !batch.search_keys.contains(&key) {
                    batch.search_keys.push(key);
                }
            }
            if batch.data.len() >= self.batch_size {
                pending.remove(&scrape.kind)
            } else {
                None
            }
        };

        match full {
            Some(batch) => self.write(scrape.kind, batch).await,
            None => json!({"msg": "batched"}),
        }
    }

    /// Write everything pending, whatever its size.
    pub async fn flush_all(&self) {
        let drained: Vec<(QueryType, Pending)> = self.pending.lock().await.drain().collect();
        for (kind, batch) in drained {
            self.write(kind, batch).await;
        }
    }

    pub async fn pending_len(&self, kind: QueryType) -> usize {
        self.pending
            .lock()
            .await
            .get(&kind)
            .map(|p| p.data.len())
            .unwrap_or(0)
    }

    async fn write(&self, kind: QueryType, batch: Pending) -> Value {
        info!(%kind, results = batch.data.len(), "Writing result batch");
        match self.store.store(kind, &batch.data, &batch.search_keys).await {
            Ok(result) => result,
            Err(e) => {
                error!(%kind, error = %e, "Failed to store result batch");
                Value::Object(Default::default())
            }
        }
    }
}

#[async_trait]
impl Handler<CompletedScrape> for ResultBatcher {
    fn name(&self) -> &str {
        "result-batcher"
    }

    async fn handle(&self, request: CompletedScrape) -> anyhow::Result<Value> {
        Ok(self.push(request).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraping_storage::{MemoryStore, NoopIndexer};

    fn scrape(kind: QueryType, id: &str, key: &str) -> CompletedScrape {
        CompletedScrape {
            kind,
            caller: Some("5Val".into()),
            search_keys: vec![key.into()],
            output: vec![json!({
                "id": id, "url": "u", "text": "t", "likes": 1, "images": [],
                "timestamp": "2024-01-01", "dataType": "post"
            })],
        }
    }

    #[tokio::test]
    async fn writes_when_batch_is_full() {
        let store = Arc::new(MemoryStore::new());
        let batcher = ResultBatcher::new(
            Arc::new(BatchStore::new(store.clone(), Arc::new(NoopIndexer))),
            2,
        );

        assert_eq!(
            batcher.push(scrape(QueryType::Twitter, "1", "tao")).await,
            json!({"msg": "batched"})
        );
        assert_eq!(batcher.pending_len(QueryType::Twitter).await, 1);
        assert!(store.keys().await.is_empty());

        batcher.push(scrape(QueryType::Twitter, "2", "tao")).await;
        assert_eq!(batcher.pending_len(QueryType::Twitter).await, 0);
        let keys = store.keys().await;
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].0, "twitterscrapingbucket");
    }

    #[tokio::test]
    async fn kinds_are_batched_separately_and_flushed() {
        let store = Arc::new(MemoryStore::new());
        let batcher = ResultBatcher::new(
            Arc::new(BatchStore::new(store.clone(), Arc::new(NoopIndexer))),
            10,
        );

        batcher.push(scrape(QueryType::Twitter, "1", "a")).await;
        batcher.push(scrape(QueryType::Reddit, "2", "b")).await;
        assert!(store.keys().await.is_empty());

        batcher.flush_all().await;

        let buckets: Vec<String> = store.keys().await.into_iter().map(|(b, _)| b).collect();
        assert_eq!(buckets, vec!["redditscrapingbucket", "twitterscrapingbucket"]);
        assert_eq!(batcher.pending_len(QueryType::Reddit).await, 0);
    }
}
