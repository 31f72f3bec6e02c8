//! At-most-one live real-time server per process.
//!
//! [`ConnectionRegistry::ensure`] attaches the server the first time it is
//! called and returns the same instance forever after. Broadcasting before
//! that point is a silent no-op.

use std::sync::{Arc, LazyLock};

use metrics::counter;
use tagcast_core::{InvalidationMessage, Tag};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::metrics::INVALIDATIONS_SKIPPED_TOTAL;
use crate::server::LiveServer;

static GLOBAL: LazyLock<Arc<ConnectionRegistry>> = LazyLock::new(|| {
    let settings = tagcast_settings::get_settings();
    Arc::new(ConnectionRegistry::new(ServerConfig::from(&settings.realtime)))
});

/// Sink for invalidation messages.
///
/// Implemented by [`ConnectionRegistry`]; the write-handler adapter publishes
/// through this trait so other transports or mocks can stand in.
#[cfg_attr(test, mockall::automock)]
pub trait Broadcaster: Send + Sync {
    /// Deliver `message` to every subscriber. Must not block.
    fn publish(&self, message: InvalidationMessage);
}

/// Holder for the process's live server.
pub struct ConnectionRegistry {
    slot: OnceCell<Arc<LiveServer>>,
    config: ServerConfig,
}

impl ConnectionRegistry {
    /// Empty registry. Servers it attaches use `config`.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            slot: OnceCell::new(),
            config,
        }
    }

    /// Process-wide registry, configured from `tagcast_settings`.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Return the live server, attaching one to `addr` if none exists.
    ///
    /// Once a server is live, `addr` is ignored. A failed attach stores
    /// nothing, so the next call retries. Concurrent first calls race on the
    /// cell and all observe the winner.
    pub async fn ensure(&self, addr: &str) -> Result<Arc<LiveServer>, ServerError> {
        let server = self
            .slot
            .get_or_try_init(|| async {
                let server = LiveServer::attach(addr, self.config.clone()).await?;
                info!(addr = %server.local_addr(), "live server registered");
                Ok::<_, ServerError>(server)
            })
            .await?;
        Ok(Arc::clone(server))
    }

    /// The live server, if one has been attached.
    pub fn current(&self) -> Option<Arc<LiveServer>> {
        self.slot.get().cloned()
    }

    /// Send `tags` and an optional toast to every connected session.
    pub fn broadcast(&self, tags: Vec<Tag>, message: Option<String>) {
        self.publish(InvalidationMessage::new(tags, message));
    }
}

impl Broadcaster for ConnectionRegistry {
    fn publish(&self, message: InvalidationMessage) {
        let Some(server) = self.current() else {
            debug!(tags = message.tags.len(), "no live server, invalidation skipped");
            counter!(INVALIDATIONS_SKIPPED_TOTAL).increment(1);
            return;
        };
        let _ = server.broadcast(&message);
    }
}

/// Broadcast through the process-wide registry.
pub fn broadcast(tags: Vec<Tag>, message: Option<String>) {
    ConnectionRegistry::global().broadcast(tags, message);
}
