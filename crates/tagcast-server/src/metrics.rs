//! Metric names and the Prometheus recorder.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the global Prometheus recorder.
///
/// Fails if another recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// WebSocket sessions accepted (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket sessions ended (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Currently open WebSocket sessions (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Frames dropped on full or closed session queues (counter).
pub const WS_BROADCAST_DROPS_TOTAL: &str = "ws_broadcast_drops_total";
/// Invalidation envelopes published (counter).
pub const INVALIDATIONS_BROADCAST_TOTAL: &str = "invalidations_broadcast_total";
/// Broadcasts skipped because no live server exists (counter).
pub const INVALIDATIONS_SKIPPED_TOTAL: &str = "invalidations_skipped_total";
