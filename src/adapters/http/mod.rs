//! HTTP adapter - the hub's public surface.
//!
//! Exposes the WebSocket endpoint, the collaborator ingest route and a health
//! check on one axum router.

pub mod ingest;

use std::sync::Arc;

use axum::{
    extract::{FromRef, State},
    http::HeaderValue,
    routing::{get, post},
    Json, Router,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::adapters::websocket::{ws_handler, RideHub};
use crate::ports::EventPublisher;

pub use ingest::{ingest_ride_event, IngestError, RideEventRequest};

/// Shared state of the HTTP surface.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<RideHub>,
    /// Where ingested ride-lifecycle events are published.
    pub publisher: Arc<dyn EventPublisher>,
    /// Bearer token collaborators present to the ingest route; ingest is
    /// refused while unset.
    pub service_token: Option<SecretString>,
}

impl FromRef<AppState> for Arc<RideHub> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.hub)
    }
}

/// Create the hub router.
///
/// # Routes
/// - `GET /health` - Liveness plus connection and ride counters
/// - `GET /ws?token=<jwt>` - WebSocket upgrade
/// - `POST /internal/ride-events` - Ride-lifecycle events from collaborators
///
/// With no configured origins CORS is permissive.
pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .route("/internal/ride-events", post(ingest_ride_event))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

async fn health(State(hub): State<Arc<RideHub>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "hub": hub.stats(),
    }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(allowed)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
