//! HTTP surface of the miner.
//!
//! Each registered plugin is served at `POST /{synapse_name}`. Admission
//! (blacklist, verify, priority) runs on headers alone; admitted requests
//! are queued by priority and answered when a worker finishes them or the
//! caller's timeout expires.

mod worker;

pub use worker::{drain_outputs, spawn_workers};

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::registry::{PluginRegistry, QueuedRequest};
use crate::synapse::{ScrapeSynapse, SynapseHeader, TerminalInfo, AXON_PREFIX};

pub struct AxonState {
    pub registry: Arc<PluginRegistry>,
    /// This axon's identity, echoed in response headers
    pub info: TerminalInfo,
    pub default_timeout: Duration,
}

pub fn router(state: Arc<AxonState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/{synapse}", post(handle_synapse))
        // method + path only; callers are logged by hotkey in the handler
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "axon_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

fn respond(
    state: &AxonState,
    status: StatusCode,
    message: impl Into<String>,
    synapse: Option<ScrapeSynapse>,
    started: Instant,
) -> Response {
    let mut info = state.info.clone();
    info.status_code = Some(status.as_u16());
    info.status_message = Some(message.into());
    info.process_time = Some(started.elapsed().as_secs_f64());

    let mut response = (status, Json(synapse.unwrap_or_default())).into_response();
    info.write_headers(AXON_PREFIX, response.headers_mut());
    response
}

async fn handle_synapse(
    State(state): State<Arc<AxonState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();

    let Some(kind) = state.registry.lookup_synapse(&name) else {
        let available: Vec<&str> = state
            .registry
            .kinds()
            .iter()
            .map(|k| k.synapse_name())
            .collect();
        return respond(
            &state,
            StatusCode::NOT_FOUND,
            format!("Synapse name '{name}' not found. Available synapses {available:?}"),
            None,
            started,
        );
    };
    let header = SynapseHeader::from_headers(&name, &headers, state.default_timeout);
    let caller = header.caller_hotkey().unwrap_or("unknown").to_string();

    match state.registry.call_blacklist_fn(kind, &header).await {
        Ok((false, _)) => {}
        Ok((true, reason)) => {
            debug!(%kind, %caller, %reason, "Blacklisted request");
            return respond(
                &state,
                StatusCode::FORBIDDEN,
                format!("Forbidden. Key is blacklisted: {reason}."),
                None,
                started,
            );
        }
        Err(e) => {
            return respond(
                &state,
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
                None,
                started,
            )
        }
    }

    match state.registry.call_verify_fn(kind, &header).await {
        Ok(Ok(())) => {}
        Ok(Err(reason)) => {
            debug!(%kind, %caller, %reason, "Request failed verification");
            return respond(
                &state,
                StatusCode::UNAUTHORIZED,
                format!("Not Verified with error: {reason}"),
                None,
                started,
            );
        }
        Err(e) => {
            return respond(
                &state,
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
                None,
                started,
            )
        }
    }

    let priority = match state.registry.call_priority_fn(kind, &header).await {
        Ok(p) => p,
        Err(e) => {
            return respond(
                &state,
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
                None,
                started,
            )
        }
    };

    let synapse: ScrapeSynapse = if body.is_empty() {
        ScrapeSynapse::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(s) => s,
            Err(e) => {
                return respond(
                    &state,
                    StatusCode::BAD_REQUEST,
                    format!("Invalid synapse body: {e}"),
                    None,
                    started,
                )
            }
        }
    };

    let queues = match state.registry.get_plugin_queues(kind) {
        Ok(q) => q,
        Err(e) => {
            return respond(
                &state,
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
                None,
                started,
            )
        }
    };

    let timeout = header.timeout;
    let (tx, rx) = oneshot::channel();
    queues
        .inputs
        .put(
            priority,
            QueuedRequest {
                header,
                synapse,
                priority,
                enqueued_at: started,
                respond_to: tx,
            },
        )
        .await;
    debug!(%kind, %caller, priority, "Request queued");

    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(Ok(synapse))) => respond(&state, StatusCode::OK, "Success", Some(synapse), started),
        Ok(Ok(Err(e))) => respond(
            &state,
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal server error: {e}"),
            None,
            started,
        ),
        Ok(Err(_)) => respond(
            &state,
            StatusCode::SERVICE_UNAVAILABLE,
            "Request dropped before it was served",
            None,
            started,
        ),
        Err(_) => {
            warn!(%kind, %caller, ?timeout, "Request timed out");
            respond(
                &state,
                StatusCode::REQUEST_TIMEOUT,
                format!("Timeout after {:.1}s", timeout.as_secs_f64()),
                None,
                started,
            )
        }
    }
}
