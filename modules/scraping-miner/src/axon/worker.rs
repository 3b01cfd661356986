use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use scraping_common::QueryType;

use crate::bus::{DispatchMiddleware, Message, MessageBus, SERVED_TOPIC};
use crate::registry::{CompletedScrape, PluginQueues, PluginRegistry, QueuedRequest};

/// Start `per_plugin` workers for every registered kind.
pub fn spawn_workers(registry: Arc<PluginRegistry>, per_plugin: usize) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();
    for kind in registry.kinds() {
        let Ok(queues) = registry.get_plugin_queues(kind) else {
            continue;
        };
        for worker in 0..per_plugin.max(1) {
            let registry = registry.clone();
            let queues = queues.clone();
            handles.push(tokio::spawn(async move {
                serve_plugin(kind, worker, registry, queues).await
            }));
        }
        info!(%kind, workers = per_plugin.max(1), "Started workers");
    }
    handles
}

async fn serve_plugin(
    kind: QueryType,
    worker: usize,
    registry: Arc<PluginRegistry>,
    queues: Arc<PluginQueues>,
) {
    loop {
        let request = queues.inputs.get().await;
        serve_one(kind, worker, &registry, &queues, request).await;
    }
}

async fn serve_one(
    kind: QueryType,
    worker: usize,
    registry: &PluginRegistry,
    queues: &PluginQueues,
    request: QueuedRequest,
) {
    let QueuedRequest {
        header,
        synapse,
        priority,
        enqueued_at,
        respond_to,
    } = request;

    if respond_to.is_closed() {
        debug!(%kind, worker, waited = ?enqueued_at.elapsed(), "Caller gone, skipping request");
        return;
    }

    let search_keys = synapse.search_keys().to_vec();
    let outcome = AssertUnwindSafe(registry.call_forward_fn(kind, &header, synapse))
        .catch_unwind()
        .await;

    let reply = match outcome {
        Ok(Ok(synapse)) => {
            if let Some(output) = synapse.scrap_output.as_ref().filter(|o| !o.is_empty()) {
                queues
                    .outputs
                    .put(
                        priority,
                        CompletedScrape {
                            kind,
                            caller: header.caller_hotkey().map(String::from),
                            search_keys,
                            output: output.clone(),
                        },
                    )
                    .await;
            }
            Ok(synapse)
        }
        Ok(Err(e)) => {
            error!(%kind, worker, error = %e, "Forward failed");
            Err(e.to_string())
        }
        Err(_) => {
            error!(%kind, worker, "Forward panicked");
            Err("forward panicked".to_string())
        }
    };

    if respond_to.send(reply).is_err() {
        warn!(%kind, worker, "Caller timed out before the response was ready");
    }
}

/// Move completed scrapes from a plugin's outputs queue to the dispatch
/// middleware and announce each one on the bus.
pub fn drain_outputs(
    kind: QueryType,
    queues: Arc<PluginQueues>,
    middleware: Arc<DispatchMiddleware<CompletedScrape>>,
    bus: Arc<dyn MessageBus>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let scrape = queues.outputs.get().await;
            let announcement = json!({
                "kind": kind.kind_name(),
                "caller": scrape.caller,
                "count": scrape.output.len(),
            })
            .to_string();

            if let Err(e) = middleware.dispatch(Message::new(scrape)).await {
                error!(%kind, error = %e, "Result dispatch failed");
            }
            if let Err(e) = bus.publish(SERVED_TOPIC, announcement).await {
                warn!(%kind, error = %e, "Could not announce served request");
            }
        }
    })
}
