#![warn(missing_docs)]

//! In-memory event store: an ordered, append-only log of domain events with
//! atomic multi-event appends and change subscriptions.
//!
//! The store is the only shared, mutable resource of the journal core.
//! Appends are serialized, subscribers are notified exactly once per
//! successful append or batch, and read operations observe either all of a
//! batch or none of it.

mod error;

pub use error::StoreError;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use squickr_core::clock::{Clock, SharedClock, SystemClock};
use squickr_core::{AggregateId, DomainEvent};
use time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Allowance for devices whose wall clock runs slightly ahead.
const MAX_CLOCK_SKEW: Duration = Duration::seconds(30);

/// Change listener invoked after each durable append or batch.
///
/// Listeners receive no change summary; they are expected to re-read the
/// projections they care about. They must not block and must not call back
/// into the store synchronously.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// The in-memory, append-only event log.
///
/// Cloning is cheap and every clone observes the same log, so writers and
/// projections can each hold their own handle.
#[derive(Clone)]
pub struct MemoryEventStore {
    inner: Arc<RwLock<LogState>>,
    subscribers: CallbackRegistry,
    clock: SharedClock,
}

#[derive(Default)]
struct LogState {
    events: Vec<DomainEvent>,
    versions: HashMap<AggregateId, u64>,
}

impl MemoryEventStore {
    /// Create an empty store using the system clock for skew checks.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store with an explicit clock (used by tests to pin
    /// the skew check).
    #[must_use]
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            inner: Arc::new(RwLock::new(LogState::default())),
            subscribers: CallbackRegistry::default(),
            clock,
        }
    }

    /// Append a single event.
    ///
    /// Returns the event's global sequence position. Subscribers are
    /// notified once, after the write.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the event is malformed; the log is left
    /// untouched.
    pub async fn append(&self, event: DomainEvent) -> Result<u64, StoreError> {
        self.append_batch(vec![event]).await
    }

    /// Append one or more events atomically.
    ///
    /// The whole batch is validated before any event becomes durable;
    /// either every event is appended and subscribers are notified once, or
    /// the log is untouched. Returns the sequence position of the last
    /// event in the batch.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the batch is empty or any event is
    /// malformed.
    pub async fn append_batch(&self, events: Vec<DomainEvent>) -> Result<u64, StoreError> {
        if events.is_empty() {
            return Err(StoreError::EmptyBatch);
        }

        let now = self.clock.now();
        let sequence;
        {
            let mut state = self.inner.write().await;

            let mut staged: HashMap<AggregateId, u64> = HashMap::new();
            for event in &events {
                Self::validate(&state, &mut staged, event, now)?;
            }

            for event in &events {
                debug!(
                    event_type = event.kind.type_name(),
                    aggregate_id = %event.aggregate_id,
                    version = event.version,
                    "appending event"
                );
            }
            state.versions.extend(staged);
            state.events.extend(events);
            sequence = sequence_of(state.events.len());
        }

        self.subscribers.notify();
        Ok(sequence)
    }

    /// Every event, in global append order.
    pub async fn get_all(&self) -> Vec<DomainEvent> {
        self.inner.read().await.events.clone()
    }

    /// Every event for one aggregate, in append order.
    pub async fn get_by_aggregate(&self, aggregate_id: &AggregateId) -> Vec<DomainEvent> {
        self.inner
            .read()
            .await
            .events
            .iter()
            .filter(|event| &event.aggregate_id == aggregate_id)
            .cloned()
            .collect()
    }

    /// Current global sequence position (number of durable events).
    pub async fn sequence(&self) -> u64 {
        sequence_of(self.inner.read().await.events.len())
    }

    /// Register a change listener. The returned [`Subscription`]
    /// unregisters it when dropped.
    pub fn subscribe(&self, callback: ChangeCallback) -> Subscription {
        self.subscribers.register(callback)
    }

    fn validate(
        state: &LogState,
        staged: &mut HashMap<AggregateId, u64>,
        event: &DomainEvent,
        now: time::OffsetDateTime,
    ) -> Result<(), StoreError> {
        if event.aggregate_id.as_str().trim().is_empty() {
            return Err(StoreError::MissingAggregateId {
                event_id: event.id.clone(),
            });
        }

        let last = staged
            .get(&event.aggregate_id)
            .or_else(|| state.versions.get(&event.aggregate_id))
            .copied()
            .unwrap_or(0);
        let expected = last + 1;
        if event.version != expected {
            return Err(StoreError::VersionConflict {
                aggregate_id: event.aggregate_id.clone(),
                expected,
                found: event.version,
            });
        }

        if event.timestamp > now + MAX_CLOCK_SKEW {
            return Err(StoreError::TimestampInFuture {
                event_id: event.id.clone(),
                timestamp: event.timestamp,
            });
        }

        staged.insert(event.aggregate_id.clone(), event.version);
        Ok(())
    }
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sequence_of(len: usize) -> u64 {
    u64::try_from(len).map_or(u64::MAX, |sequence| sequence)
}

/// Registry of change callbacks, shared between a store (or projection) and
/// the [`Subscription`] guards it hands out.
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    inner: Arc<Mutex<RegistryState>>,
}

#[derive(Default)]
struct RegistryState {
    callbacks: HashMap<u64, ChangeCallback>,
}

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

impl CallbackRegistry {
    /// Register a callback; dropping the returned guard unregisters it.
    pub fn register(&self, callback: ChangeCallback) -> Subscription {
        let id = NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed);
        self.lock().callbacks.insert(id, callback);
        Subscription {
            id,
            registry: Arc::clone(&self.inner),
        }
    }

    /// Invoke every registered callback once.
    pub fn notify(&self) {
        let callbacks: Vec<ChangeCallback> = self.lock().callbacks.values().cloned().collect();
        for callback in callbacks {
            callback();
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Guard for a registered change listener; dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    registry: Arc<Mutex<RegistryState>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut state = match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.callbacks.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use squickr_core::clock::ManualClock;
    use squickr_core::{EntryId, EventKind};
    use std::sync::atomic::AtomicUsize;
    use time::macros::datetime;

    fn created(id: &EntryId, version: u64, at: time::OffsetDateTime) -> DomainEvent {
        DomainEvent::new(
            id,
            version,
            at,
            EventKind::TaskCreated {
                title: "task".into(),
                collection_id: None,
                parent_entry_id: None,
                order: "V".into(),
                user_id: None,
            },
        )
    }

    fn completed(id: &EntryId, version: u64, at: time::OffsetDateTime) -> DomainEvent {
        DomainEvent::new(id, version, at, EventKind::TaskCompleted { completed_at: at })
    }

    fn clock() -> (ManualClock, time::OffsetDateTime) {
        let start = datetime!(2026-02-01 09:00:00 UTC);
        (ManualClock::new(start), start)
    }

    #[tokio::test]
    async fn appends_preserve_global_and_per_aggregate_order() {
        let (clock, now) = clock();
        let store = MemoryEventStore::with_clock(Arc::new(clock));
        let a = EntryId::new();
        let b = EntryId::new();

        store.append(created(&a, 1, now)).await.unwrap();
        store.append(created(&b, 1, now)).await.unwrap();
        store.append(completed(&a, 2, now)).await.unwrap();

        let all = store.get_all().await;
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].aggregate_id, AggregateId::from(&a));
        assert_eq!(all[2].version, 2);

        let for_a = store.get_by_aggregate(&AggregateId::from(&a)).await;
        assert_eq!(for_a.len(), 2);
        assert_eq!(for_a[0].version, 1);
        assert_eq!(for_a[1].version, 2);
    }

    #[tokio::test]
    async fn version_gaps_are_rejected() {
        let (clock, now) = clock();
        let store = MemoryEventStore::with_clock(Arc::new(clock));
        let task = EntryId::new();

        store.append(created(&task, 1, now)).await.unwrap();
        let err = store.append(completed(&task, 3, now)).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict {
                expected: 2,
                found: 3,
                ..
            }
        ));
        assert_eq!(store.sequence().await, 1);
    }

    #[tokio::test]
    async fn a_failing_batch_leaves_the_log_untouched() {
        let (clock, now) = clock();
        let store = MemoryEventStore::with_clock(Arc::new(clock));
        let a = EntryId::new();
        let b = EntryId::new();

        store.append(created(&a, 1, now)).await.unwrap();

        // Second event in the batch carries a stale version.
        let err = store
            .append_batch(vec![created(&b, 1, now), completed(&a, 1, now)])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));

        let all = store.get_all().await;
        assert_eq!(all.len(), 1, "no event of the failed batch is visible");
        assert_eq!(
            store.get_by_aggregate(&AggregateId::from(&b)).await.len(),
            0
        );
    }

    #[tokio::test]
    async fn batches_may_grow_one_aggregate_by_several_versions() {
        let (clock, now) = clock();
        let store = MemoryEventStore::with_clock(Arc::new(clock));
        let task = EntryId::new();

        store
            .append_batch(vec![created(&task, 1, now), completed(&task, 2, now)])
            .await
            .unwrap();
        assert_eq!(store.sequence().await, 2);
    }

    #[tokio::test]
    async fn far_future_timestamps_are_rejected() {
        let (clock, now) = clock();
        let store = MemoryEventStore::with_clock(Arc::new(clock));
        let task = EntryId::new();

        let err = store
            .append(created(&task, 1, now + Duration::minutes(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TimestampInFuture { .. }));

        // Small skew is tolerated.
        store
            .append(created(&task, 1, now + Duration::seconds(10)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn subscribers_fire_once_per_append_or_batch() {
        let (clock, now) = clock();
        let store = MemoryEventStore::with_clock(Arc::new(clock));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let subscription = store.subscribe(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let a = EntryId::new();
        let b = EntryId::new();
        store.append(created(&a, 1, now)).await.unwrap();
        store
            .append_batch(vec![created(&b, 1, now), completed(&b, 2, now)])
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        drop(subscription);
        store.append(completed(&a, 2, now)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2, "dropped subscription is gone");
    }

    #[tokio::test]
    async fn empty_batches_are_rejected() {
        let store = MemoryEventStore::new();
        assert!(matches!(
            store.append_batch(vec![]).await,
            Err(StoreError::EmptyBatch)
        ));
    }
}
