use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("queue {0} is closed")]
    Closed(String),
}

/// Called once per delivered message.
pub type Listener = Arc<dyn Fn(Vec<u8>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Raw byte delivery between named queues.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, data: Vec<u8>, queue_name: &str) -> Result<(), TransportError>;
    async fn setup_listener(
        &self,
        queue_name: &str,
        callback: Listener,
    ) -> Result<(), TransportError>;
}

/// In-process transport. Every listener on a queue gets every message;
/// messages sent to a queue nobody listens on are dropped.
#[derive(Default)]
pub struct MemoryTransport {
    queues: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<Vec<u8>>>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, data: Vec<u8>, queue_name: &str) -> Result<(), TransportError> {
        let mut queues = self.queues.lock().await;
        let Some(senders) = queues.get_mut(queue_name) else {
            debug!(queue_name, "No listeners, dropping message");
            return Ok(());
        };

        senders.retain(|tx| !tx.is_closed());
        if senders.is_empty() {
            return Err(TransportError::Closed(queue_name.to_string()));
        }
        for tx in senders.iter() {
            // A listener that closed since `retain` is simply skipped.
            let _ = tx.send(data.clone());
        }
        Ok(())
    }

    async fn setup_listener(
        &self,
        queue_name: &str,
        callback: Listener,
    ) -> Result<(), TransportError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        self.queues
            .lock()
            .await
            .entry(queue_name.to_string())
            .or_default()
            .push(tx);

        let queue = queue_name.to_string();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                callback(message).await;
            }
            debug!(queue, "Listener stopped");
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::time::Duration;

    fn collector() -> (Listener, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener: Listener = Arc::new(move |msg: Vec<u8>| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(msg);
            }
            .boxed()
        });
        (listener, rx)
    }

    #[tokio::test]
    async fn every_listener_receives_each_message() {
        let transport = MemoryTransport::new();
        let (a, mut rx_a) = collector();
        let (b, mut rx_b) = collector();
        transport.setup_listener("results", a).await.unwrap();
        transport.setup_listener("results", b).await.unwrap();

        transport.send(b"hello".to_vec(), "results").await.unwrap();

        let wait = Duration::from_secs(1);
        assert_eq!(tokio::time::timeout(wait, rx_a.recv()).await.unwrap().unwrap(), b"hello");
        assert_eq!(tokio::time::timeout(wait, rx_b.recv()).await.unwrap().unwrap(), b"hello");
    }

    #[tokio::test]
    async fn unknown_queue_drops_message() {
        let transport = MemoryTransport::new();
        assert!(transport.send(b"x".to_vec(), "nobody").await.is_ok());
    }
}
