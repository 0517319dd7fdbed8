//! Fan-in of a primary source with projection sources.

use async_trait::async_trait;
use futures::stream::{select_all, StreamExt};
use tracing::info;

use crate::error::SourceError;
use crate::ports::MessageSource;
use crate::source::Source;
use crate::subscription::{Subscription, SubscriptionHandle};

/// One logical feed over a primary stream and zero or more projections.
///
/// Order is preserved per underlying stream; interleaving across streams is
/// arrival order. A terminal error on any stream ends the merged feed.
pub struct MergedSource<M> {
    primary: Source<M>,
    projections: Vec<Source<M>>,
}

impl<M: Send + 'static> MergedSource<M> {
    #[must_use]
    pub fn new(primary: Source<M>) -> Self {
        Self {
            primary,
            projections: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_projection(mut self, projection: Source<M>) -> Self {
        self.projections.push(projection);
        self
    }

    #[must_use]
    pub fn primary(&self) -> &Source<M> {
        &self.primary
    }

    #[must_use]
    pub fn projections(&self) -> &[Source<M>] {
        &self.projections
    }

    /// Subscribe every underlying source and merge them.
    ///
    /// # Errors
    ///
    /// The first subscribe failure. Subscriptions already opened are
    /// disposed when they are dropped on the error path.
    pub async fn subscribe(&self) -> Result<Subscription<M>, SourceError> {
        if self.projections.is_empty() {
            return self.primary.subscribe().await;
        }

        let mut subscriptions = Vec::with_capacity(self.projections.len() + 1);
        for source in std::iter::once(&self.primary).chain(&self.projections) {
            subscriptions.push(source.subscribe().await?);
        }

        let handles = subscriptions.iter().map(Subscription::handle).collect();
        info!(
            stream = %self.primary.stream(),
            projections = self.projections.len(),
            "Merged subscription started"
        );
        Ok(Subscription::new(
            select_all(subscriptions).boxed(),
            SubscriptionHandle::merged(handles),
        ))
    }
}

#[async_trait]
impl<M: Send + 'static> MessageSource<M> for MergedSource<M> {
    async fn subscribe(&self) -> Result<Subscription<M>, SourceError> {
        MergedSource::subscribe(self).await
    }
}
