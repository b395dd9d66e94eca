//! Façade bundling the writers and projections over one store.

use std::sync::Arc;

use squickr_core::clock::{SharedClock, SystemClock};
use squickr_store_mem::MemoryEventStore;

use crate::collection_projection::CollectionProjection;
use crate::collection_writer::CollectionWriter;
use crate::entry_projection::EntryProjection;
use crate::entry_writer::EntryWriter;
use crate::event_store::EventStore;
use crate::task_projection::TaskProjection;
use crate::task_writer::TaskWriter;

/// One journal: command writers and read models sharing a single event log.
///
/// The UI layer issues commands through the writers and renders from the
/// projections; nothing else ever mutates state.
pub struct Journal<S: EventStore + Clone> {
    store: S,
    task_writer: TaskWriter<S>,
    entry_writer: EntryWriter<S>,
    collection_writer: CollectionWriter<S>,
    entries: EntryProjection<S>,
    collections: CollectionProjection<S>,
    tasks: TaskProjection<S>,
}

impl<S: EventStore + Clone> Journal<S> {
    /// Assemble a journal over `store`, stamping events with `clock`.
    pub fn new(store: S, clock: SharedClock) -> Self {
        Self {
            task_writer: TaskWriter::new(store.clone(), Arc::clone(&clock)),
            entry_writer: EntryWriter::new(store.clone(), Arc::clone(&clock)),
            collection_writer: CollectionWriter::new(store.clone(), Arc::clone(&clock)),
            entries: EntryProjection::new(store.clone()),
            collections: CollectionProjection::new(store.clone()),
            tasks: TaskProjection::new(store.clone()),
            store,
        }
    }

    /// Task command handlers.
    pub const fn task_writer(&self) -> &TaskWriter<S> {
        &self.task_writer
    }

    /// Note, event, and move command handlers.
    pub const fn entry_writer(&self) -> &EntryWriter<S> {
        &self.entry_writer
    }

    /// Collection command handlers.
    pub const fn collection_writer(&self) -> &CollectionWriter<S> {
        &self.collection_writer
    }

    /// Read model over every entry.
    pub const fn entries(&self) -> &EntryProjection<S> {
        &self.entries
    }

    /// Read model over collections.
    pub const fn collections(&self) -> &CollectionProjection<S> {
        &self.collections
    }

    /// Task-only read model.
    pub const fn tasks(&self) -> &TaskProjection<S> {
        &self.tasks
    }

    /// Borrow the underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }
}

impl Journal<MemoryEventStore> {
    /// In-memory journal on the system clock.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::in_memory_with_clock(Arc::new(SystemClock))
    }

    /// In-memory journal on an explicit clock (tests pin time through this).
    #[must_use]
    pub fn in_memory_with_clock(clock: SharedClock) -> Self {
        let store = MemoryEventStore::with_clock(Arc::clone(&clock));
        Self::new(store, clock)
    }
}
