//! Write-handler wrapper that broadcasts an invalidation after a 2xx.
//!
//! ```ignore
//! let create = with_invalidation(vec![Tag::list("NewsCategory")], Some("Категория создана"))
//!     .wrap(create_category);
//! let response = create.call(payload, ()).await;
//! ```
//!
//! Every handler takes `(input, ctx)`. Handlers without a context use `()`.

use std::future::Future;
use std::sync::Arc;

use axum::http::{Response, StatusCode};
use tagcast_core::{InvalidationMessage, Tag};
use tracing::debug;

use crate::registry::{Broadcaster, ConnectionRegistry};

/// Whether a handler result counts as a successful mutation.
pub trait MutationOutcome {
    /// `true` for 2xx results.
    fn succeeded(&self) -> bool;
}

impl MutationOutcome for StatusCode {
    fn succeeded(&self) -> bool {
        self.is_success()
    }
}

impl<B> MutationOutcome for Response<B> {
    fn succeeded(&self) -> bool {
        self.status().is_success()
    }
}

impl<T> MutationOutcome for (StatusCode, T) {
    fn succeeded(&self) -> bool {
        self.0.is_success()
    }
}

impl<T: MutationOutcome, E> MutationOutcome for Result<T, E> {
    fn succeeded(&self) -> bool {
        self.as_ref().is_ok_and(MutationOutcome::succeeded)
    }
}

/// An async write handler taking an input and a context.
///
/// Implemented for every `Fn(I, C) -> impl Future` whose output is a
/// [`MutationOutcome`].
pub trait WriteHandler<I, C>: Send + Sync {
    /// Handler result, returned to the caller unchanged.
    type Output: MutationOutcome + Send;

    /// Run the handler.
    fn call(&self, input: I, ctx: C) -> impl Future<Output = Self::Output> + Send;
}

impl<F, Fut, I, C> WriteHandler<I, C> for F
where
    F: Fn(I, C) -> Fut + Send + Sync,
    Fut: Future + Send,
    Fut::Output: MutationOutcome + Send,
{
    type Output = Fut::Output;

    fn call(&self, input: I, ctx: C) -> impl Future<Output = Self::Output> + Send {
        self(input, ctx)
    }
}

/// Declared tags and toast for a write route.
#[derive(Clone, Debug)]
pub struct Invalidation {
    message: InvalidationMessage,
}

/// Declare what a write route invalidates.
pub fn with_invalidation(tags: Vec<Tag>, message: Option<&str>) -> Invalidation {
    Invalidation {
        message: InvalidationMessage::new(tags, message.map(str::to_owned)),
    }
}

impl Invalidation {
    /// Wrap `handler`, broadcasting through the process-wide registry.
    pub fn wrap<H>(self, handler: H) -> Invalidating<H> {
        self.wrap_with(handler, ConnectionRegistry::global())
    }

    /// Wrap `handler`, broadcasting through `broadcaster`.
    pub fn wrap_with<H>(self, handler: H, broadcaster: Arc<dyn Broadcaster>) -> Invalidating<H> {
        Invalidating {
            handler,
            message: self.message,
            broadcaster,
        }
    }

    /// The message published on success.
    pub fn message(&self) -> &InvalidationMessage {
        &self.message
    }
}

/// A handler wrapped by [`Invalidation::wrap`].
pub struct Invalidating<H> {
    handler: H,
    message: InvalidationMessage,
    broadcaster: Arc<dyn Broadcaster>,
}

impl<H> Invalidating<H> {
    /// Run the handler and broadcast once if it succeeded.
    ///
    /// The handler's result is returned untouched. Errors and panics from the
    /// handler propagate without a broadcast.
    pub async fn call<I, C>(&self, input: I, ctx: C) -> H::Output
    where
        H: WriteHandler<I, C>,
    {
        let output = self.handler.call(input, ctx).await;
        if output.succeeded() {
            self.broadcaster.publish(self.message.clone());
        } else {
            debug!(tags = self.message.tags.len(), "mutation did not succeed, no invalidation");
        }
        output
    }
}
