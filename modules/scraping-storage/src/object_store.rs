use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;

/// Outcome of a successful upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutResult {
    pub status: u16,
}

/// Pluggable object storage backend.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<PutResult>;
}

/// In-process store. Backs tests and runs where no bucket is configured.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub async fn keys(&self) -> Vec<(String, String)> {
        let mut keys: Vec<_> = self.objects.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        _content_type: &str,
    ) -> Result<PutResult> {
        self.objects
            .lock()
            .await
            .insert((bucket.to_string(), key.to_string()), body);
        Ok(PutResult { status: 200 })
    }
}
