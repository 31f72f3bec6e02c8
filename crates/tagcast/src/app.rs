//! Site router assembly.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tagcast_server::site::bootstrap_router;
use tagcast_server::{Broadcaster, ConnectionRegistry};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::admin::{AdminStore, admin_router};

/// Everything the site router needs.
pub struct SiteOptions {
    /// Registry that owns the live real-time server.
    pub registry: Arc<ConnectionRegistry>,
    /// Address handed to `ensure` by the bootstrap route.
    pub realtime_addr: String,
    /// Backing store for the admin routes.
    pub store: Arc<AdminStore>,
    /// Prometheus handle for `/metrics`, if the recorder installed.
    pub metrics: Option<PrometheusHandle>,
    /// Allow any origin.
    pub permissive_cors: bool,
}

/// `/api/socket`, the admin routes, and `/metrics`.
pub fn site_router(options: SiteOptions) -> Router {
    let broadcaster: Arc<dyn Broadcaster> = options.registry.clone();
    let mut app = Router::new()
        .merge(bootstrap_router(options.registry, &options.realtime_addr))
        .merge(admin_router(options.store, broadcaster));

    if let Some(handle) = options.metrics {
        app = app.route("/metrics", get(move || std::future::ready(handle.render())));
    }
    if options.permissive_cors {
        app = app.layer(CorsLayer::permissive());
    }
    app.layer(TraceLayer::new_for_http())
}
