use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::transport::{Transport, TransportError};

/// Consumer of one request type. `name` must be unique per middleware.
#[async_trait]
pub trait Handler<R>: Send + Sync {
    fn name(&self) -> &str;
    async fn handle(&self, request: R) -> anyhow::Result<Value>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub handler: String,
    pub result: Value,
}

/// A request plus the handlers that have already consumed it, so a
/// redelivered message is not handled twice.
#[derive(Debug, Clone)]
pub struct Message<R> {
    pub request: R,
    pub dispatched: Vec<Dispatch>,
}

impl<R> Message<R> {
    pub fn new(request: R) -> Self {
        Self {
            request,
            dispatched: Vec::new(),
        }
    }

    pub fn was_handled_by(&self, handler: &str) -> bool {
        self.dispatched.iter().any(|d| d.handler == handler)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("could not encode {request_class}: {source}")]
    Encode {
        request_class: String,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("{} handler(s) failed for {request_class}: {}", .errors.len(), join(.errors))]
    Handlers {
        request_class: String,
        errors: Vec<anyhow::Error>,
    },
}

fn join(errors: &[anyhow::Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Publishes each request on `channel` and hands a fresh copy to every
/// local handler that has not seen it yet. Handler failures are collected,
/// not short-circuited.
pub struct DispatchMiddleware<R> {
    transport: Arc<dyn Transport>,
    channel: String,
    handlers: Vec<Arc<dyn Handler<R>>>,
}

impl<R> fmt::Debug for DispatchMiddleware<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchMiddleware")
            .field("channel", &self.channel)
            .field("handlers", &self.handlers.iter().map(|h| h.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl<R> DispatchMiddleware<R>
where
    R: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(transport: Arc<dyn Transport>, channel: impl Into<String>) -> Self {
        Self {
            transport,
            channel: channel.into(),
            handlers: Vec::new(),
        }
    }

    pub fn with_handler(mut self, handler: Arc<dyn Handler<R>>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub async fn dispatch(&self, mut message: Message<R>) -> Result<Message<R>, DispatchError> {
        let request_class = std::any::type_name::<R>()
            .rsplit("::")
            .next()
            .unwrap_or_default()
            .to_string();
        let encoded =
            serde_json::to_vec(&message.request).map_err(|source| DispatchError::Encode {
                request_class: request_class.clone(),
                source,
            })?;

        self.transport.send(encoded.clone(), &self.channel).await?;

        let before = message.dispatched.len();
        let mut errors = Vec::new();
        for handler in &self.handlers {
            if message.was_handled_by(handler.name()) {
                continue;
            }
            let request: R = match serde_json::from_slice(&encoded) {
                Ok(request) => request,
                Err(e) => {
                    errors.push(e.into());
                    continue;
                }
            };
            match handler.handle(request).await {
                Ok(result) => message.dispatched.push(Dispatch {
                    handler: handler.name().to_string(),
                    result,
                }),
                Err(e) => {
                    warn!(handler = handler.name(), %request_class, error = %e, "Handler failed");
                    errors.push(e);
                }
            }
        }

        if message.dispatched.len() == before && errors.is_empty() {
            info!(%request_class, channel = %self.channel, "No handlers for request");
        }
        if !errors.is_empty() {
            return Err(DispatchError::Handlers {
                request_class,
                errors,
            });
        }
        Ok(message)
    }
}
