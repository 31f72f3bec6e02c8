//! `LiveServer`: the attached Axum WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::{Json, Response};
use axum::routing::get;
use serde::Serialize;
use tagcast_core::{ClientId, InvalidationMessage};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::{ServerConfig, WS_PATH};
use crate::errors::ServerError;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::BroadcastManager;
use crate::websocket::session::run_ws_session;

/// State shared by the `/ws` and `/health` handlers.
#[derive(Clone)]
struct LiveState {
    broadcast: Arc<BroadcastManager>,
    config: ServerConfig,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

/// `/health` body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `"ok"`, or `"draining"` once [`LiveServer::stop`] has started.
    pub status: &'static str,
    /// Seconds since attach.
    pub uptime_secs: u64,
    /// Open sessions.
    pub connections: usize,
}

/// A real-time server bound to a TCP address and accepting sessions.
///
/// Created by [`LiveServer::attach`]. Normally owned by a
/// [`ConnectionRegistry`](crate::registry::ConnectionRegistry), which keeps at
/// most one per process.
pub struct LiveServer {
    local_addr: SocketAddr,
    broadcast: Arc<BroadcastManager>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    config: ServerConfig,
}

impl LiveServer {
    /// Bind `addr` and start serving `/ws` and `/health` in the background.
    pub async fn attach(addr: &str, config: ServerConfig) -> Result<Arc<Self>, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_owned(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

        let server = Arc::new(Self {
            local_addr,
            broadcast: Arc::new(BroadcastManager::with_max_drops(config.max_drops)),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            config,
        });

        let app = server.router();
        let token = server.shutdown.token();
        server.shutdown.track(tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                warn!(error = %e, "real-time server stopped with error");
            }
        }));

        info!(addr = %local_addr, path = WS_PATH, "real-time server attached");
        Ok(server)
    }

    /// Build the router. Exposed for in-process `oneshot` tests.
    pub fn router(&self) -> Router {
        let state = LiveState {
            broadcast: self.broadcast.clone(),
            config: self.config.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
        };

        Router::new()
            .route(WS_PATH, get(ws_handler))
            .route("/health", get(health_handler))
            .with_state(state)
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `ws://` URL clients connect to.
    pub fn ws_url(&self) -> String {
        format!("ws://{}{WS_PATH}", self.local_addr)
    }

    /// Open sessions.
    pub fn connection_count(&self) -> usize {
        self.broadcast.connection_count()
    }

    /// Publish one invalidation to every open session.
    pub fn broadcast(&self, message: &InvalidationMessage) -> usize {
        self.broadcast.broadcast(message)
    }

    /// The shutdown coordinator shared with every session.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Stop accepting connections, close sessions, and wait for the serve
    /// loop to finish.
    pub async fn stop(&self, timeout: Option<Duration>) {
        let clean = self.shutdown.drain(timeout).await;
        info!(addr = %self.local_addr, clean, "real-time server stopped");
    }
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<LiveState>) -> Response {
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| async move {
            let _ = run_ws_session(
                socket,
                ClientId::new(),
                state.broadcast,
                state.config,
                state.shutdown.token(),
            )
            .await;
        })
}

/// GET /health
async fn health_handler(State(state): State<LiveState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: if state.shutdown.is_draining() { "draining" } else { "ok" },
        uptime_secs: state.start_time.elapsed().as_secs(),
        connections: state.broadcast.connection_count(),
    })
}
