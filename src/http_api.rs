// Admin control surface plus the `/events` monitor stream. Exit codes on
// startup failure follow the service's own convention (see `main`); this
// module only serves requests once the Supervisor has already come up.

use crate::agents::registry::Registry;
use crate::bus::{topic_matches, EventBus};
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub struct ApiState {
    pub registry: Arc<Registry>,
    pub bus: Arc<EventBus>,
    pub ready: Arc<AtomicBool>,
    pub shutdown: tokio_util::sync::CancellationToken,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/agents", get(list_agents))
        .route("/agents/:id/enable", post(enable_agent))
        .route("/agents/:id/disable", post(disable_agent))
        .route("/reload", post(reload))
        .route("/shutdown", post(shutdown))
        .route("/events", get(events))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "alive"}))
}

async fn ready(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    if state.ready.load(Ordering::Relaxed) {
        (axum::http::StatusCode::OK, Json(serde_json::json!({"ready": true})))
    } else {
        (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"ready": false})),
        )
    }
}

async fn list_agents(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let ids = state.registry.list(None, None);
    let agents: Vec<_> = ids
        .iter()
        .map(|id| {
            serde_json::json!({
                "id": id,
                "state": state.registry.runtime_state(id),
            })
        })
        .collect();
    Json(agents)
}

/// Agents are disabled/enabled by posting `Stop`/`Start`; a disabled agent
/// simply never re-enters `Idle` so `pick` never selects it again.
async fn enable_agent(State(state): State<Arc<ApiState>>, Path(id): Path<String>) -> impl IntoResponse {
    state
        .registry
        .send(&id, crate::agents::AgentEvent::Start);
    Json(serde_json::json!({"id": id, "action": "enable"}))
}

async fn disable_agent(State(state): State<Arc<ApiState>>, Path(id): Path<String>) -> impl IntoResponse {
    state.registry.send(&id, crate::agents::AgentEvent::Stop);
    Json(serde_json::json!({"id": id, "action": "disable"}))
}

async fn reload() -> impl IntoResponse {
    Json(serde_json::json!({"reload": "not yet applied; restart required"}))
}

async fn shutdown(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    state.shutdown.cancel();
    Json(serde_json::json!({"shutdown": "initiated"}))
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    #[serde(default = "default_topic_filter")]
    topic: String,
}

fn default_topic_filter() -> String {
    "*".to_string()
}

enum Frame {
    Bus(Result<crate::bus::Event, tokio_stream::wrappers::errors::BroadcastStreamRecvError>),
    Heartbeat,
}

/// Streams bus events as SSE frames `{topic, ts, payload}`, filtered by the
/// `topic` query param; a heartbeat every 30s keeps idle connections open.
async fn events(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let bus_stream = BroadcastStream::new(state.bus.subscribe()).map(Frame::Bus);
    let heartbeat_stream =
        IntervalStream::new(tokio::time::interval(Duration::from_secs(30))).map(|_| Frame::Heartbeat);
    let bus = state.bus.clone();

    let merged = futures::stream::select(bus_stream, heartbeat_stream).filter_map(move |frame| {
        let topic_filter = query.topic.clone();
        let bus = bus.clone();
        async move {
            match frame {
                Frame::Heartbeat => {
                    let hb = crate::bus::Event::heartbeat();
                    Some(Ok(SseEvent::default().data(serde_json::to_string(&hb).unwrap())))
                }
                Frame::Bus(Ok(event)) if topic_matches(&topic_filter, &event.topic) => {
                    Some(Ok(SseEvent::default().data(serde_json::to_string(&event).unwrap())))
                }
                Frame::Bus(Ok(_)) => None,
                Frame::Bus(Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(n))) => {
                    bus.record_dropped(n);
                    None
                }
            }
        }
    });

    Sse::new(merged)
}
