//! Async storage contract consumed by writers and projections.

use std::sync::Arc;

use squickr_core::{AggregateId, DomainEvent};
use squickr_store_mem::{ChangeCallback, MemoryEventStore, StoreError, Subscription};

/// Minimal event-log abstraction required by the journal core.
///
/// The contract mirrors the append-only log semantics: appends are
/// serialized and atomic per call, reads return events in append order, and
/// subscribers are notified once per successful append or batch.
#[allow(async_fn_in_trait)]
pub trait EventStore: Send + Sync {
    /// Error type bubbled up from the backing store.
    type Error: Into<anyhow::Error> + Send;
    /// Guard returned by [`subscribe`](Self::subscribe); dropping it
    /// unregisters the listener.
    type Subscription: Send;

    /// Append a single event; returns its global sequence position.
    ///
    /// # Errors
    /// Returns a store-specific error when the event is malformed or the
    /// write fails; the log must be left untouched.
    async fn append(&self, event: DomainEvent) -> Result<u64, Self::Error>;

    /// Append one or more events atomically; returns the sequence position
    /// of the last.
    ///
    /// # Errors
    /// Returns a store-specific error when any event is malformed or the
    /// write fails; no event of the batch may become visible.
    async fn append_batch(&self, events: Vec<DomainEvent>) -> Result<u64, Self::Error>;

    /// Every event, in global append order.
    ///
    /// # Errors
    /// Returns a store-specific error when the read fails.
    async fn get_all(&self) -> Result<Vec<DomainEvent>, Self::Error>;

    /// Every event for one aggregate, in append order.
    ///
    /// # Errors
    /// Returns a store-specific error when the read fails.
    async fn get_by_aggregate(
        &self,
        aggregate_id: &AggregateId,
    ) -> Result<Vec<DomainEvent>, Self::Error>;

    /// Register a change listener, called after each successful append or
    /// batch with no change summary.
    fn subscribe(&self, callback: ChangeCallback) -> Self::Subscription;
}

impl EventStore for MemoryEventStore {
    type Error = StoreError;
    type Subscription = Subscription;

    async fn append(&self, event: DomainEvent) -> Result<u64, Self::Error> {
        Self::append(self, event).await
    }

    async fn append_batch(&self, events: Vec<DomainEvent>) -> Result<u64, Self::Error> {
        Self::append_batch(self, events).await
    }

    async fn get_all(&self) -> Result<Vec<DomainEvent>, Self::Error> {
        Ok(Self::get_all(self).await)
    }

    async fn get_by_aggregate(
        &self,
        aggregate_id: &AggregateId,
    ) -> Result<Vec<DomainEvent>, Self::Error> {
        Ok(Self::get_by_aggregate(self, aggregate_id).await)
    }

    fn subscribe(&self, callback: ChangeCallback) -> Self::Subscription {
        Self::subscribe(self, callback)
    }
}

impl<S> EventStore for Arc<S>
where
    S: EventStore,
{
    type Error = S::Error;
    type Subscription = S::Subscription;

    async fn append(&self, event: DomainEvent) -> Result<u64, Self::Error> {
        (**self).append(event).await
    }

    async fn append_batch(&self, events: Vec<DomainEvent>) -> Result<u64, Self::Error> {
        (**self).append_batch(events).await
    }

    async fn get_all(&self) -> Result<Vec<DomainEvent>, Self::Error> {
        (**self).get_all().await
    }

    async fn get_by_aggregate(
        &self,
        aggregate_id: &AggregateId,
    ) -> Result<Vec<DomainEvent>, Self::Error> {
        (**self).get_by_aggregate(aggregate_id).await
    }

    fn subscribe(&self, callback: ChangeCallback) -> Self::Subscription {
        (**self).subscribe(callback)
    }
}
