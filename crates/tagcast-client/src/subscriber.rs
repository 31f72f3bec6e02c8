//! Reconnecting subscriber task.
//!
//! ```text
//! Disconnected ──greeting──▶ Connected
//!      ▲                          │
//!      └──── close / error ◀──────┘   (backoff, then retry)
//! ```
//!
//! One [`InvalidationListener`] lives for the whole task, so the toast
//! window survives reconnects. Frames sent while disconnected are lost.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tagcast_core::InvalidationMessage;
use tagcast_settings::ClientSettings;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::backoff::Backoff;
use crate::cache::QueryCache;
use crate::errors::ClientError;
use crate::listener::InvalidationListener;
use crate::notify::{Notifier, ToastDebouncer};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Capacity of the re-published event stream.
const EVENT_CHANNEL_CAPACITY: usize = 64;
/// Timeout for the bootstrap request.
const BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Subscriber configuration.
#[derive(Clone, Debug)]
pub struct SubscriberConfig {
    /// WebSocket URL used when bootstrap is disabled or returns no URL.
    pub url: String,
    /// Site route hit before every connect attempt.
    pub bootstrap_url: Option<String>,
    /// Minimum gap between two shown toasts.
    pub toast_debounce: Duration,
    /// First reconnect delay.
    pub reconnect_base_delay: Duration,
    /// Reconnect delay cap.
    pub reconnect_max_delay: Duration,
}

impl From<&ClientSettings> for SubscriberConfig {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            url: settings.url.clone(),
            bootstrap_url: settings.bootstrap_url.clone(),
            toast_debounce: Duration::from_millis(settings.toast_debounce_ms),
            reconnect_base_delay: Duration::from_millis(settings.reconnect_base_delay_ms),
            reconnect_max_delay: Duration::from_millis(settings.reconnect_max_delay_ms),
        }
    }
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self::from(&ClientSettings::default())
    }
}

/// Connection state observed through [`SubscriberHandle::state`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriberState {
    /// No open socket. Initial and terminal state.
    Disconnected,
    /// Greeted by the server; every later broadcast reaches this subscriber.
    Connected,
}

#[derive(Debug)]
enum SessionEnd {
    ServerClosed,
    Transport(String),
    Shutdown,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServerClosed => f.write_str("server closed"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Shutdown => f.write_str("shutdown"),
        }
    }
}

#[derive(Deserialize)]
struct BootstrapResponse {
    url: Option<String>,
}

/// Client side of the invalidation stream.
pub struct Subscriber {
    config: SubscriberConfig,
    cache: Arc<dyn QueryCache>,
    notifier: Arc<dyn Notifier>,
    http: reqwest::Client,
}

impl Subscriber {
    /// Subscriber that applies invalidations to `cache` and toasts through
    /// `notifier`.
    pub fn new(
        config: SubscriberConfig,
        cache: Arc<dyn QueryCache>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(BOOTSTRAP_TIMEOUT)
            .build()
            .map_err(ClientError::HttpClient)?;
        Ok(Self {
            config,
            cache,
            notifier,
            http,
        })
    }

    /// Start the connection loop on the current runtime.
    pub fn spawn(self) -> SubscriberHandle {
        let (state_tx, state_rx) = watch::channel(SubscriberState::Disconnected);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(self.run(state_tx, events_tx.clone(), shutdown.clone()));

        SubscriberHandle {
            state: state_rx,
            events: events_tx,
            shutdown,
            task,
        }
    }

    #[instrument(skip_all, fields(url = %self.config.url))]
    async fn run(
        self,
        state: watch::Sender<SubscriberState>,
        events: broadcast::Sender<InvalidationMessage>,
        shutdown: CancellationToken,
    ) {
        let mut listener = InvalidationListener::new(
            self.cache.clone(),
            self.notifier.clone(),
            ToastDebouncer::new(self.config.toast_debounce),
            events,
        );
        let backoff = Backoff::new(
            self.config.reconnect_base_delay,
            self.config.reconnect_max_delay,
        );
        let mut attempt: u32 = 0;

        loop {
            let url = self.resolve_url().await;
            let connected = tokio::select! {
                result = connect_async(url.as_str()) => result,
                () = shutdown.cancelled() => break,
            };

            match connected {
                Ok((ws, _)) => {
                    attempt = 0;
                    debug!(url = %url, "handshake complete, awaiting greeting");
                    let end = listen(ws, &mut listener, &state, &shutdown).await;
                    let _ = state.send_replace(SubscriberState::Disconnected);
                    info!(reason = %end, "subscriber disconnected");
                    if matches!(end, SessionEnd::Shutdown) {
                        break;
                    }
                }
                Err(e) => {
                    warn!(attempt, error = %ClientError::from(e), "connect failed");
                }
            }

            let delay = backoff.delay(attempt);
            attempt = attempt.saturating_add(1);
            debug!(delay = ?delay, "reconnecting after delay");
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = shutdown.cancelled() => break,
            }
        }

        let _ = state.send_replace(SubscriberState::Disconnected);
    }

    /// Hit the bootstrap route, preferring the URL it returns.
    async fn resolve_url(&self) -> String {
        let Some(bootstrap_url) = &self.config.bootstrap_url else {
            return self.config.url.clone();
        };
        match self.bootstrap(bootstrap_url).await {
            Ok(Some(url)) => url,
            Ok(None) => self.config.url.clone(),
            Err(e) => {
                warn!(error = %e, "bootstrap failed, connecting anyway");
                self.config.url.clone()
            }
        }
    }

    async fn bootstrap(&self, bootstrap_url: &str) -> Result<Option<String>, ClientError> {
        let to_err = |source| ClientError::Bootstrap {
            url: bootstrap_url.to_owned(),
            source,
        };
        let body: BootstrapResponse = self
            .http
            .get(bootstrap_url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(to_err)?
            .json()
            .await
            .map_err(to_err)?;
        Ok(body.url)
    }
}

/// Read frames until the socket ends or shutdown fires.
///
/// The state turns [`Connected`](SubscriberState::Connected) on the server's
/// greeting, which the server sends only once the session receives broadcasts.
async fn listen(
    ws: WsStream,
    listener: &mut InvalidationListener,
    state: &watch::Sender<SubscriberState>,
    shutdown: &CancellationToken,
) -> SessionEnd {
    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if listener.handle_text(&text) {
                        let _ = state.send_replace(SubscriberState::Connected);
                        info!("subscriber connected");
                    }
                }
                Some(Ok(Message::Close(_))) | None => return SessionEnd::ServerClosed,
                Some(Ok(_)) => {}
                Some(Err(e)) => return SessionEnd::Transport(e.to_string()),
            },
            () = shutdown.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                return SessionEnd::Shutdown;
            }
        }
    }
}

/// Handle to a running [`Subscriber`].
pub struct SubscriberHandle {
    state: watch::Receiver<SubscriberState>,
    events: broadcast::Sender<InvalidationMessage>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl SubscriberHandle {
    /// Watch connection state changes.
    pub fn state(&self) -> watch::Receiver<SubscriberState> {
        self.state.clone()
    }

    /// Every invalidation received from now on.
    pub fn events(&self) -> broadcast::Receiver<InvalidationMessage> {
        self.events.subscribe()
    }

    /// Wait until the subscriber reaches `target`.
    pub async fn wait_for(&self, target: SubscriberState) {
        let mut rx = self.state.clone();
        let _ = rx.wait_for(|s| *s == target).await;
    }

    /// Close the socket and stop reconnecting. No events are replayed.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "subscriber task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_follows_client_settings() {
        let cfg = SubscriberConfig::default();
        assert_eq!(cfg.url, "ws://127.0.0.1:3001/ws");
        assert_eq!(cfg.toast_debounce, Duration::from_millis(1000));
        assert_eq!(cfg.reconnect_base_delay, Duration::from_millis(1000));
        assert_eq!(cfg.reconnect_max_delay, Duration::from_millis(5000));
        assert!(cfg.bootstrap_url.is_some());
    }

    #[test]
    fn session_end_display() {
        assert_eq!(SessionEnd::ServerClosed.to_string(), "server closed");
        assert_eq!(
            SessionEnd::Transport("reset".into()).to_string(),
            "transport error: reset"
        );
    }

    #[tokio::test]
    async fn unreachable_server_stays_disconnected_until_shutdown() {
        let config = SubscriberConfig {
            url: "ws://127.0.0.1:1/ws".into(),
            bootstrap_url: None,
            reconnect_base_delay: Duration::from_millis(10),
            reconnect_max_delay: Duration::from_millis(20),
            ..SubscriberConfig::default()
        };
        let handle = Subscriber::new(
            config,
            Arc::new(crate::cache::MemoryQueryCache::new()),
            Arc::new(crate::notify::LogNotifier),
        )
        .unwrap()
        .spawn();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*handle.state().borrow(), SubscriberState::Disconnected);
        handle.shutdown().await;
    }
}
