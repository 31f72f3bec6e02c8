//! Site-side bootstrap route that lazily attaches the live server.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use serde_json::json;
use tracing::{instrument, warn};

use crate::registry::ConnectionRegistry;

/// Path of the bootstrap route.
pub const BOOTSTRAP_PATH: &str = "/api/socket";

#[derive(Clone)]
struct BootstrapState {
    registry: Arc<ConnectionRegistry>,
    realtime_addr: Arc<str>,
}

/// Router serving `GET /api/socket`.
///
/// Each request calls [`ConnectionRegistry::ensure`] with `realtime_addr`
/// and answers with the live server's WebSocket URL.
pub fn bootstrap_router(registry: Arc<ConnectionRegistry>, realtime_addr: &str) -> Router {
    Router::new()
        .route(BOOTSTRAP_PATH, get(bootstrap_handler))
        .with_state(BootstrapState {
            registry,
            realtime_addr: Arc::from(realtime_addr),
        })
}

#[instrument(skip_all, fields(addr = %state.realtime_addr))]
async fn bootstrap_handler(State(state): State<BootstrapState>) -> Response {
    match state.registry.ensure(&state.realtime_addr).await {
        Ok(server) => Json(json!({ "url": server.ws_url() })).into_response(),
        Err(e) => {
            warn!(error = %e, "failed to attach real-time server");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
