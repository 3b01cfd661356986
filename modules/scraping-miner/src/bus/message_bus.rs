use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;

use super::transport::{Listener, Transport, TransportError};

pub type Subscriber = Arc<dyn Fn(String) -> BoxFuture<'static, ()> + Send + Sync>;

/// Text messages on named topics.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, topic: &str, message: String) -> Result<(), TransportError>;
    async fn subscribe(&self, topic: &str, callback: Subscriber) -> Result<(), TransportError>;
}

/// [`MessageBus`] over any [`Transport`]; topics map to queue names.
pub struct TransportBus {
    transport: Arc<dyn Transport>,
}

impl TransportBus {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl MessageBus for TransportBus {
    async fn publish(&self, topic: &str, message: String) -> Result<(), TransportError> {
        self.transport.send(message.into_bytes(), topic).await
    }

    async fn subscribe(&self, topic: &str, callback: Subscriber) -> Result<(), TransportError> {
        let listener: Listener = Arc::new(move |bytes: Vec<u8>| {
            let callback = callback.clone();
            async move {
                callback(String::from_utf8_lossy(&bytes).into_owned()).await;
            }
            .boxed()
        });
        self.transport.setup_listener(topic, listener).await
    }
}
