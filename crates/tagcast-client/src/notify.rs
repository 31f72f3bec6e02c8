//! Toast notifications and the debounce gate in front of them.

use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

/// Displays a user-facing status line.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    /// Show `message`.
    fn notify(&self, message: &str);
}

/// [`Notifier`] that emits toasts as `tracing` events.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        info!(toast = message, "notification");
    }
}

/// Admits at most one toast per window.
///
/// A toast is admitted when no toast has been shown yet, or when strictly
/// more than `window` has passed since the last admitted one. Suppressed
/// toasts do not move the window.
#[derive(Debug)]
pub struct ToastDebouncer {
    window: Duration,
    last_shown: Option<Instant>,
}

impl ToastDebouncer {
    /// Gate with the given window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_shown: None,
        }
    }

    /// Admit or suppress a toast arriving now.
    pub fn admit(&mut self) -> bool {
        self.admit_at(Instant::now())
    }

    /// Admit or suppress a toast arriving at `now`.
    pub fn admit_at(&mut self, now: Instant) -> bool {
        let open = self
            .last_shown
            .is_none_or(|last| now.saturating_duration_since(last) > self.window);
        if open {
            self.last_shown = Some(now);
        }
        open
    }

    /// The debounce window.
    pub fn window(&self) -> Duration {
        self.window
    }
}
