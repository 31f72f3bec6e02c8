//! Real server, real subscriber, real TCP.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use tokio::time::timeout;

use tagcast_client::{
    MemoryQueryCache, Notifier, Subscriber, SubscriberConfig, SubscriberHandle, SubscriberState,
};
use tagcast_core::Tag;
use tagcast_server::{ConnectionRegistry, LiveServer, ServerConfig};

const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Recorder(Mutex<Vec<String>>);

impl Notifier for Recorder {
    fn notify(&self, message: &str) {
        self.0.lock().push(message.to_owned());
    }
}

struct Harness {
    registry: Arc<ConnectionRegistry>,
    server: Arc<LiveServer>,
    cache: Arc<MemoryQueryCache>,
    toasts: Arc<Recorder>,
    handle: SubscriberHandle,
}

async fn boot() -> Harness {
    let registry = Arc::new(ConnectionRegistry::new(ServerConfig::default()));
    let server = registry.ensure("127.0.0.1:0").await.unwrap();

    let cache = Arc::new(MemoryQueryCache::new());
    cache.insert("heroes", vec![Tag::list("Hero")], json!([]));
    cache.insert("quote:q1", vec![Tag::new("AdminQuote", "q1")], json!({}));
    let toasts = Arc::new(Recorder::default());

    let config = SubscriberConfig {
        url: server.ws_url(),
        bootstrap_url: None,
        reconnect_base_delay: Duration::from_millis(50),
        reconnect_max_delay: Duration::from_millis(200),
        ..SubscriberConfig::default()
    };
    let handle = Subscriber::new(config, cache.clone(), toasts.clone())
        .unwrap()
        .spawn();

    timeout(TIMEOUT, handle.wait_for(SubscriberState::Connected))
        .await
        .expect("subscriber never connected");

    Harness {
        registry,
        server,
        cache,
        toasts,
        handle,
    }
}

async fn wait_for_sessions(server: &LiveServer, expected: usize) {
    timeout(TIMEOUT, async {
        while server.connection_count() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("session count never settled");
}

#[tokio::test]
async fn invalidation_reaches_cache_and_toast() {
    let h = boot().await;
    let mut events = h.handle.events();

    h.registry
        .broadcast(vec![Tag::list("Hero")], Some("Слайд обновлён".into()));

    let got = timeout(TIMEOUT, events.recv()).await.unwrap().unwrap();
    assert_eq!(got.tags, vec![Tag::list("Hero")]);
    assert_eq!(h.cache.is_stale("heroes"), Some(true));
    assert_eq!(h.cache.is_stale("quote:q1"), Some(false));
    assert_eq!(*h.toasts.0.lock(), vec!["Слайд обновлён".to_owned()]);

    h.handle.shutdown().await;
    h.server.stop(Some(Duration::from_secs(1))).await;
}

#[tokio::test]
async fn message_less_invalidation_shows_no_toast() {
    let h = boot().await;
    let mut events = h.handle.events();

    h.registry.broadcast(vec![Tag::new("AdminQuote", "q1")], None);

    let _ = timeout(TIMEOUT, events.recv()).await.unwrap().unwrap();
    assert_eq!(h.cache.is_stale("quote:q1"), Some(true));
    assert!(h.toasts.0.lock().is_empty());

    h.handle.shutdown().await;
    h.server.stop(Some(Duration::from_secs(1))).await;
}

#[tokio::test]
async fn burst_collapses_into_one_toast() {
    let h = boot().await;
    let mut events = h.handle.events();

    h.registry.broadcast(vec![Tag::list("Hero")], Some("A".into()));
    h.registry.broadcast(vec![Tag::new("Hero", "h1")], Some("B".into()));

    for _ in 0..2 {
        let _ = timeout(TIMEOUT, events.recv()).await.unwrap().unwrap();
    }
    let toasts = h.toasts.0.lock().clone();
    assert_eq!(toasts, vec!["A".to_owned()]);

    h.handle.shutdown().await;
    h.server.stop(Some(Duration::from_secs(1))).await;
}

#[tokio::test]
async fn broadcast_as_soon_as_connected_is_received() {
    for _ in 0..20 {
        let h = boot().await;
        let mut events = h.handle.events();

        h.registry.broadcast(vec![Tag::list("Hero")], None);

        let got = timeout(TIMEOUT, events.recv()).await.unwrap().unwrap();
        assert_eq!(got.tags, vec![Tag::list("Hero")]);
        assert_eq!(h.server.connection_count(), 1);

        h.handle.shutdown().await;
        h.server.stop(Some(Duration::from_secs(1))).await;
    }
}

#[tokio::test]
async fn shutdown_closes_session() {
    let h = boot().await;
    let mut state = h.handle.state();

    h.handle.shutdown().await;
    assert_eq!(*state.borrow_and_update(), SubscriberState::Disconnected);
    wait_for_sessions(&h.server, 0).await;

    h.server.stop(Some(Duration::from_secs(1))).await;
}

#[tokio::test]
async fn subscriber_reconnects_after_server_appears() {
    let reserved = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = reserved.local_addr().unwrap().to_string();
    drop(reserved);

    let cache = Arc::new(MemoryQueryCache::new());
    let config = SubscriberConfig {
        url: format!("ws://{addr}/ws"),
        bootstrap_url: None,
        reconnect_base_delay: Duration::from_millis(20),
        reconnect_max_delay: Duration::from_millis(50),
        ..SubscriberConfig::default()
    };
    let handle = Subscriber::new(config, cache, Arc::new(Recorder::default()))
        .unwrap()
        .spawn();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(*handle.state().borrow(), SubscriberState::Disconnected);

    let registry = ConnectionRegistry::new(ServerConfig::default());
    let server = registry.ensure(&addr).await.unwrap();

    timeout(TIMEOUT, handle.wait_for(SubscriberState::Connected))
        .await
        .expect("subscriber never reconnected");

    handle.shutdown().await;
    server.stop(Some(Duration::from_secs(1))).await;
}
