//! Frame handling for a connected subscriber.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tagcast_core::{ClientId, Envelope, InvalidationMessage, ServerEvent};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::cache::QueryCache;
use crate::notify::{Notifier, ToastDebouncer};

/// Applies `invalidate` events to the cache and the toast gate.
///
/// Nothing raised while handling a frame escapes: decode errors and panics
/// from the cache or notifier are logged and the listener keeps going.
pub struct InvalidationListener {
    cache: Arc<dyn QueryCache>,
    notifier: Arc<dyn Notifier>,
    debouncer: ToastDebouncer,
    events: broadcast::Sender<InvalidationMessage>,
}

impl InvalidationListener {
    /// Listener over `cache` and `notifier`, republishing on `events`.
    pub fn new(
        cache: Arc<dyn QueryCache>,
        notifier: Arc<dyn Notifier>,
        debouncer: ToastDebouncer,
        events: broadcast::Sender<InvalidationMessage>,
    ) -> Self {
        Self {
            cache,
            notifier,
            debouncer,
            events,
        }
    }

    /// Handle one text frame. Returns `true` for the server's
    /// `connection.established` greeting.
    pub fn handle_text(&mut self, text: &str) -> bool {
        let event = match Envelope::decode(text).and_then(Envelope::into_event) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "ignoring malformed frame");
                return false;
            }
        };
        match event {
            ServerEvent::Invalidate(message) => self.apply(message),
            ServerEvent::ConnectionEstablished { client_id } => {
                debug!(
                    client_id = client_id.as_ref().map_or("", ClientId::as_str),
                    "connection established"
                );
                return true;
            }
            ServerEvent::Unknown(event_type) => {
                debug!(event_type, "ignoring unknown event");
            }
        }
        false
    }

    /// Invalidate `message.tags`, then show the toast if the gate is open.
    pub fn apply(&mut self, message: InvalidationMessage) {
        let cache = &self.cache;
        if catch_unwind(AssertUnwindSafe(|| cache.invalidate_tags(&message.tags))).is_err() {
            warn!(tags = message.tags.len(), "cache invalidation panicked");
        }

        if let Some(text) = message.toast() {
            if self.debouncer.admit() {
                let notifier = &self.notifier;
                if catch_unwind(AssertUnwindSafe(|| notifier.notify(text))).is_err() {
                    warn!("notifier panicked");
                }
            } else {
                debug!(toast = text, "toast suppressed");
            }
        }

        let _ = self.events.send(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use parking_lot::Mutex;
    use serde_json::json;
    use tagcast_core::Tag;

    use crate::cache::{MemoryQueryCache, MockQueryCache};
    use crate::notify::MockNotifier;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl Notifier for Recorder {
        fn notify(&self, message: &str) {
            self.0.lock().push(message.to_owned());
        }
    }

    struct Panicking;

    impl QueryCache for Panicking {
        fn invalidate_tags(&self, _tags: &[Tag]) {
            panic!("cache exploded");
        }
    }

    fn listener(
        cache: Arc<dyn QueryCache>,
        notifier: Arc<dyn Notifier>,
    ) -> (InvalidationListener, broadcast::Receiver<InvalidationMessage>) {
        let (tx, rx) = broadcast::channel(16);
        let gate = ToastDebouncer::new(Duration::from_millis(1000));
        (InvalidationListener::new(cache, notifier, gate, tx), rx)
    }

    fn frame(data: &serde_json::Value) -> String {
        json!({"type": "invalidate", "timestamp": "2026-01-01T00:00:00Z", "data": data})
            .to_string()
    }

    #[tokio::test(start_paused = true)]
    async fn quote_without_message_invalidates_silently() {
        let cache = Arc::new(MemoryQueryCache::new());
        cache.insert("quote:q1", vec![Tag::new("AdminQuote", "q1")], json!({}));
        let recorder = Arc::new(Recorder::default());
        let (mut l, mut rx) = listener(cache.clone(), recorder.clone());

        assert!(!l.handle_text(&frame(&json!({"tags": [{"type": "AdminQuote", "id": "q1"}]}))));

        assert_eq!(cache.is_stale("quote:q1"), Some(true));
        assert!(recorder.0.lock().is_empty());
        assert_eq!(rx.try_recv().unwrap().tags, vec![Tag::new("AdminQuote", "q1")]);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_within_window_shows_first_toast_only() {
        let recorder = Arc::new(Recorder::default());
        let (mut l, _rx) = listener(Arc::new(MemoryQueryCache::new()), recorder.clone());
        let tags = vec![Tag::list("Hero")];

        l.apply(InvalidationMessage::new(tags.clone(), Some("A".into())));
        tokio::time::advance(Duration::from_millis(200)).await;
        l.apply(InvalidationMessage::new(tags, Some("B".into())));

        assert_eq!(*recorder.0.lock(), vec!["A".to_owned()]);
    }

    #[tokio::test(start_paused = true)]
    async fn toasts_apart_are_both_shown() {
        let recorder = Arc::new(Recorder::default());
        let (mut l, _rx) = listener(Arc::new(MemoryQueryCache::new()), recorder.clone());
        let tags = vec![Tag::list("News")];

        l.apply(InvalidationMessage::new(tags.clone(), Some("A".into())));
        tokio::time::advance(Duration::from_millis(1500)).await;
        l.apply(InvalidationMessage::new(tags, Some("B".into())));

        assert_eq!(*recorder.0.lock(), vec!["A".to_owned(), "B".to_owned()]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_message_is_not_a_toast() {
        let recorder = Arc::new(Recorder::default());
        let (mut l, _rx) = listener(Arc::new(MemoryQueryCache::new()), recorder.clone());
        l.apply(InvalidationMessage::new(vec![Tag::list("Theme")], Some(String::new())));
        assert!(recorder.0.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn tags_are_forwarded_verbatim() {
        let tags = vec![Tag::list("Recipe"), Tag::new("Recipe", "r1")];
        let expected = tags.clone();
        let mut cache = MockQueryCache::new();
        let _ = cache
            .expect_invalidate_tags()
            .withf(move |got: &[Tag]| got == expected.as_slice())
            .times(1)
            .return_const(());
        let (mut l, _rx) = listener(Arc::new(cache), Arc::new(Recorder::default()));
        l.apply(InvalidationMessage::new(tags, None));
    }

    #[tokio::test(start_paused = true)]
    async fn notifier_receives_toast_text() {
        let mut notifier = MockNotifier::new();
        let _ = notifier
            .expect_notify()
            .withf(|text: &str| text == "Слайд обновлён")
            .times(1)
            .return_const(());
        let (mut l, _rx) = listener(Arc::new(MemoryQueryCache::new()), Arc::new(notifier));
        l.apply(InvalidationMessage::new(
            vec![Tag::list("Hero")],
            Some("Слайд обновлён".into()),
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_cache_does_not_stop_listener() {
        let recorder = Arc::new(Recorder::default());
        let (mut l, mut rx) = listener(Arc::new(Panicking), recorder.clone());

        l.apply(InvalidationMessage::new(vec![Tag::list("Hero")], Some("still shown".into())));

        assert_eq!(*recorder.0.lock(), vec!["still shown".to_owned()]);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_and_unknown_frames_are_ignored() {
        let cache = Arc::new(MemoryQueryCache::new());
        cache.insert("heroes", vec![Tag::list("Hero")], json!([]));
        let (mut l, mut rx) = listener(cache.clone(), Arc::new(Recorder::default()));

        assert!(!l.handle_text("not json"));
        assert!(!l.handle_text(r#"{"type":"invalidate","timestamp":"t","data":{"tags":"nope"}}"#));
        assert!(!l.handle_text(r#"{"type":"session.updated","timestamp":"t","data":{}}"#));
        assert!(l.handle_text(r#"{"type":"connection.established","timestamp":"t","data":{"clientId":"c1"}}"#));

        assert!(cache.stale_keys().is_empty());
        assert!(rx.try_recv().is_err());

        assert!(!l.handle_text(&frame(&json!({"tags": [{"type": "Hero", "id": "LIST"}]}))));
        assert_eq!(cache.stale_keys(), vec!["heroes".to_owned()]);
    }
}
