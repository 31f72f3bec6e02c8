//! Stop signal plus the background tasks that must finish before a live
//! server counts as stopped.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Cancellation shared by the serve loop and every session, and the task
/// handles awaited on [`drain`](Self::drain).
#[derive(Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tracked: Mutex<Vec<JoinHandle<()>>>,
}

impl ShutdownCoordinator {
    /// Coordinator with no tracked tasks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that fires when the server starts draining.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Await `handle` during the next drain.
    pub fn track(&self, handle: JoinHandle<()>) {
        self.tracked.lock().push(handle);
    }

    /// Whether draining has started.
    pub fn is_draining(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fire the token and wait up to `timeout` for tracked tasks.
    ///
    /// Returns `false` if the timeout elapsed first; unfinished tasks are
    /// aborted. Later calls only wait on tasks tracked since.
    pub async fn drain(&self, timeout: Option<Duration>) -> bool {
        let timeout = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);
        self.token.cancel();

        let handles = std::mem::take(&mut *self.tracked.lock());
        if handles.is_empty() {
            return true;
        }
        info!(tasks = handles.len(), timeout = ?timeout, "draining");

        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        if tokio::time::timeout(timeout, futures::future::join_all(handles))
            .await
            .is_ok()
        {
            return true;
        }
        warn!(timeout = ?timeout, "drain timed out, aborting remaining tasks");
        for handle in aborts {
            handle.abort();
        }
        false
    }
}
