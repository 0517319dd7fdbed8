//! # Subscriptions
//!
//! A `Subscription` is the consumer side of a live feed: a
//! `futures::Stream` of `Result<M, SourceError>` that ends after the first
//! error. Its `SubscriptionHandle` can be cloned and disposed from any
//! thread; disposing stops delivery and releases the store-side feed.
//!
//! ## Lifecycle
//!
//! ```text
//!   Active ──dispose() / drop──▶ Disposed        (stream yields None)
//!     │
//!     └──terminal error──▶ Terminated            (one Err, then None)
//! ```

use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::watch;

use crate::error::SourceError;

struct HandleInner {
    disposed: AtomicBool,
    shutdown: watch::Sender<bool>,
    children: Vec<SubscriptionHandle>,
}

/// Cloneable, thread-safe disposer for one subscription.
#[derive(Clone)]
pub struct SubscriptionHandle {
    inner: Arc<HandleInner>,
}

impl SubscriptionHandle {
    /// A handle plus the shutdown signal its pump task listens on.
    pub(crate) fn new() -> (Self, watch::Receiver<bool>) {
        let (shutdown, receiver) = watch::channel(false);
        let handle = Self {
            inner: Arc::new(HandleInner {
                disposed: AtomicBool::new(false),
                shutdown,
                children: Vec::new(),
            }),
        };
        (handle, receiver)
    }

    /// A handle that disposes every child with itself.
    pub(crate) fn merged(children: Vec<SubscriptionHandle>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(HandleInner {
                disposed: AtomicBool::new(false),
                shutdown,
                children,
            }),
        }
    }

    /// Stop delivery. Idempotent; safe to call before the feed has started.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.shutdown.send_replace(true);
        for child in &self.inner.children {
            child.dispose();
        }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("disposed", &self.is_disposed())
            .field("children", &self.inner.children.len())
            .finish()
    }
}

/// A live typed feed.
///
/// Yields messages in arrival order. The first `Err` is also the last item.
/// Dropping the subscription disposes it.
pub struct Subscription<M> {
    stream: BoxStream<'static, Result<M, SourceError>>,
    handle: SubscriptionHandle,
    terminated: bool,
}

impl<M> Subscription<M> {
    pub(crate) fn new(
        stream: BoxStream<'static, Result<M, SourceError>>,
        handle: SubscriptionHandle,
    ) -> Self {
        Self {
            stream,
            handle,
            terminated: false,
        }
    }

    #[must_use]
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    pub fn dispose(&self) {
        self.handle.dispose();
    }

    /// Whether the feed ended with an error.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl<M> Stream for Subscription<M> {
    type Item = Result<M, SourceError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.terminated || this.handle.is_disposed() {
            return Poll::Ready(None);
        }

        match this.stream.poll_next_unpin(cx) {
            Poll::Ready(Some(Err(err))) => {
                this.terminated = true;
                this.handle.dispose();
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.terminated = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl<M> Drop for Subscription<M> {
    fn drop(&mut self) {
        self.handle.dispose();
    }
}

impl<M> fmt::Debug for Subscription<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("handle", &self.handle)
            .field("terminated", &self.terminated)
            .finish()
    }
}
