//! Read model over all journal entries: tasks, notes, and events.
//!
//! The projection folds the full log into a keyed map of entries and
//! answers the queries the UI renders from, including the bullet-journal
//! ghost semantics for migrated and moved entries.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use squickr_core::{
    CollectionHistoryEntry, CollectionId, DomainEvent, Entry, EntryId, EventKind, JournalEvent,
    Note, Task,
};
use squickr_store_mem::{CallbackRegistry, ChangeCallback, Subscription};
use time::OffsetDateTime;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::{CommandError, CommandResult};
use crate::event_store::EventStore;

/// One row of a collection view.
#[derive(Debug, Clone)]
pub struct CollectionViewEntry {
    /// The entry to render.
    pub entry: Entry,
    /// Whether the entry renders as a strike-through ghost.
    pub render_as_ghost: bool,
    /// Where the entry lives now, for ghost rows.
    pub ghost_new_location: Option<CollectionId>,
}

/// Cached read model over every entry in the log.
///
/// Queries re-fold the log whenever the store has changed since the last
/// read, so results are always consistent with the log at call time.
pub struct EntryProjection<S: EventStore> {
    store: S,
    cache: Mutex<EntryCache>,
    dirty: Arc<AtomicBool>,
    subscribers: CallbackRegistry,
    _store_subscription: S::Subscription,
}

impl<S: EventStore> EntryProjection<S> {
    /// Attach a projection to `store`.
    pub fn new(store: S) -> Self {
        let dirty = Arc::new(AtomicBool::new(true));
        let subscribers = CallbackRegistry::default();
        let callback: ChangeCallback = {
            let dirty = Arc::clone(&dirty);
            let subscribers = subscribers.clone();
            Arc::new(move || {
                dirty.store(true, Ordering::Release);
                subscribers.notify();
            })
        };
        let subscription = store.subscribe(callback);
        Self {
            store,
            cache: Mutex::new(EntryCache::default()),
            dirty,
            subscribers,
            _store_subscription: subscription,
        }
    }

    /// Register a change listener re-notified on every store change.
    pub fn subscribe(&self, callback: ChangeCallback) -> Subscription {
        self.subscribers.register(callback)
    }

    /// All entries that have not been deleted, in order.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn entries(&self) -> CommandResult<Vec<Entry>> {
        let cache = self.fresh_cache().await?;
        let mut entries: Vec<Entry> = cache
            .entries
            .values()
            .filter(|entry| !entry.is_deleted())
            .cloned()
            .collect();
        sort_entries(&mut entries);
        Ok(entries)
    }

    /// All tasks that have not been deleted, in order.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn tasks(&self) -> CommandResult<Vec<Task>> {
        let cache = self.fresh_cache().await?;
        let mut tasks: Vec<Task> = cache
            .entries
            .values()
            .filter_map(Entry::as_task)
            .filter(|task| !task.deleted)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        Ok(tasks)
    }

    /// Look up a task by id, whether it is an original or a migrated copy.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn task_by_id(&self, task_id: &EntryId) -> CommandResult<Option<Task>> {
        let cache = self.fresh_cache().await?;
        Ok(cache
            .entries
            .get(task_id)
            .and_then(Entry::as_task)
            .cloned())
    }

    /// Look up any entry by id.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn entry_by_id(&self, entry_id: &EntryId) -> CommandResult<Option<Entry>> {
        let cache = self.fresh_cache().await?;
        Ok(cache.entries.get(entry_id).cloned())
    }

    /// Child tasks of `parent_id` that have not been deleted, in order.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn sub_tasks(&self, parent_id: &EntryId) -> CommandResult<Vec<Task>> {
        let cache = self.fresh_cache().await?;
        let mut children: Vec<Task> = cache
            .entries
            .values()
            .filter_map(Entry::as_task)
            .filter(|task| !task.deleted && task.parent_entry_id.as_ref() == Some(parent_id))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        Ok(children)
    }

    /// Entries to display when looking at `collection_id`.
    ///
    /// Active residents render normally. An entry renders as a ghost when it
    /// was migrated elsewhere from this collection, or when its residency
    /// here was closed and it lives in another collection now; the ghost
    /// points at the entry's latest known live location. Entries that were
    /// never here produce nothing.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn entries_for_collection_view(
        &self,
        collection_id: &CollectionId,
    ) -> CommandResult<Vec<CollectionViewEntry>> {
        let cache = self.fresh_cache().await?;
        let mut rows = Vec::new();
        for entry in cache.entries.values() {
            if entry.is_deleted() {
                continue;
            }

            let migrated_elsewhere = entry.migrated_to().is_some()
                && entry.migrated_to_collection_id() != Some(collection_id);
            let currently_in = entry.is_in_collection(collection_id);
            let ever_here = entry
                .collection_history()
                .iter()
                .any(|row| &row.collection_id == collection_id);
            let residency_closed = entry
                .collection_history()
                .iter()
                .any(|row| &row.collection_id == collection_id && row.removed_at.is_some());

            if currently_in && !migrated_elsewhere {
                rows.push(CollectionViewEntry {
                    entry: entry.clone(),
                    render_as_ghost: false,
                    ghost_new_location: None,
                });
            } else if migrated_elsewhere && (currently_in || ever_here) {
                rows.push(CollectionViewEntry {
                    entry: entry.clone(),
                    render_as_ghost: true,
                    ghost_new_location: entry.migrated_to_collection_id().cloned(),
                });
            } else if !currently_in && residency_closed {
                // Moved away; the ghost points at wherever the entry lives now.
                if let Some(live) = entry.collection_id() {
                    rows.push(CollectionViewEntry {
                        entry: entry.clone(),
                        render_as_ghost: true,
                        ghost_new_location: Some(live.clone()),
                    });
                }
            }
        }
        rows.sort_by(|a, b| {
            a.entry
                .order()
                .cmp(b.entry.order())
                .then_with(|| a.entry.id().cmp(b.entry.id()))
        });
        Ok(rows)
    }

    /// Largest order key across every entry ever created, used to append new
    /// entries at the end of the shared order space.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn last_entry_order(&self) -> CommandResult<Option<String>> {
        let cache = self.fresh_cache().await?;
        Ok(cache
            .entries
            .values()
            .map(|entry| entry.order().to_owned())
            .max())
    }

    async fn fresh_cache(&self) -> CommandResult<MutexGuard<'_, EntryCache>> {
        let mut guard = self.cache.lock().await;
        if self.dirty.swap(false, Ordering::AcqRel) {
            let events = self.store.get_all().await.map_err(CommandError::store)?;
            *guard = EntryCache::fold(&events);
        }
        Ok(guard)
    }
}

fn sort_entries(entries: &mut [Entry]) {
    entries.sort_by(|a, b| a.order().cmp(b.order()).then_with(|| a.id().cmp(b.id())));
}

#[derive(Default)]
struct EntryCache {
    entries: HashMap<EntryId, Entry>,
}

impl EntryCache {
    fn fold(events: &[DomainEvent]) -> Self {
        let mut cache = Self::default();
        for event in events {
            cache.apply(event);
        }
        cache
    }

    fn apply(&mut self, event: &DomainEvent) {
        if !event.kind.is_entry_event() {
            return;
        }
        let entry_id = EntryId::from(&event.aggregate_id);
        match &event.kind {
            EventKind::TaskCreated {
                title,
                collection_id,
                parent_entry_id,
                order,
                ..
            } => {
                self.entries.insert(
                    entry_id.clone(),
                    Entry::Task(Task::from_created(
                        entry_id,
                        event.timestamp,
                        title.clone(),
                        collection_id.clone(),
                        parent_entry_id.clone(),
                        order.clone(),
                    )),
                );
            }
            EventKind::NoteCreated {
                content,
                collection_id,
                order,
            } => {
                self.entries.insert(
                    entry_id.clone(),
                    Entry::Note(Note::from_created(
                        entry_id,
                        event.timestamp,
                        content.clone(),
                        collection_id.clone(),
                        order.clone(),
                    )),
                );
            }
            EventKind::EventCreated {
                content,
                event_date,
                collection_id,
                order,
            } => {
                self.entries.insert(
                    entry_id.clone(),
                    Entry::Event(JournalEvent::from_created(
                        entry_id,
                        event.timestamp,
                        content.clone(),
                        event_date.clone(),
                        collection_id.clone(),
                        order.clone(),
                    )),
                );
            }
            EventKind::TaskMigrated {
                target_collection_id,
                migrated_to_id,
            } => {
                let copy = match self.entries.get_mut(&entry_id) {
                    Some(Entry::Task(original)) => {
                        original.apply(event);
                        Some(Entry::Task(migrated_task(
                            original,
                            target_collection_id.as_ref(),
                            migrated_to_id,
                            event.timestamp,
                        )))
                    }
                    _ => None,
                };
                if let Some(copy) = copy {
                    self.entries.insert(migrated_to_id.clone(), copy);
                }
            }
            EventKind::NoteMigrated {
                target_collection_id,
                migrated_to_id,
            } => {
                let copy = match self.entries.get_mut(&entry_id) {
                    Some(Entry::Note(original)) => {
                        original.apply(event);
                        Some(Entry::Note(migrated_note(
                            original,
                            target_collection_id.as_ref(),
                            migrated_to_id,
                            event.timestamp,
                        )))
                    }
                    _ => None,
                };
                if let Some(copy) = copy {
                    self.entries.insert(migrated_to_id.clone(), copy);
                }
            }
            EventKind::EventMigrated {
                target_collection_id,
                migrated_to_id,
            } => {
                let copy = match self.entries.get_mut(&entry_id) {
                    Some(Entry::Event(original)) => {
                        original.apply(event);
                        Some(Entry::Event(migrated_journal_event(
                            original,
                            target_collection_id.as_ref(),
                            migrated_to_id,
                            event.timestamp,
                        )))
                    }
                    _ => None,
                };
                if let Some(copy) = copy {
                    self.entries.insert(migrated_to_id.clone(), copy);
                }
            }
            _ => {
                if let Some(entry) = self.entries.get_mut(&entry_id) {
                    entry.apply(event);
                }
            }
        }
    }
}

fn residency(collection_id: Option<&CollectionId>, at: OffsetDateTime) -> Vec<CollectionHistoryEntry> {
    collection_id
        .map(|id| CollectionHistoryEntry {
            collection_id: id.clone(),
            added_at: at,
            removed_at: None,
        })
        .into_iter()
        .collect()
}

/// Build the active copy a task migration creates: title, status, and
/// creation instant carry over; the copy starts its own event stream with
/// back-pointers at the original.
fn migrated_task(
    original: &Task,
    target: Option<&CollectionId>,
    copy_id: &EntryId,
    at: OffsetDateTime,
) -> Task {
    Task {
        id: copy_id.clone(),
        title: original.title.clone(),
        created_at: original.created_at,
        status: original.status,
        completed_at: original.completed_at,
        order: original.order.clone(),
        collection_id: target.cloned(),
        collections: target.cloned().into_iter().collect(),
        collection_history: residency(target, at),
        migrated_to: None,
        migrated_from: Some(original.id.clone()),
        migrated_to_collection_id: None,
        migrated_from_collection_id: original.collection_id.clone(),
        parent_entry_id: original.parent_entry_id.clone(),
        deleted: false,
    }
}

fn migrated_note(
    original: &Note,
    target: Option<&CollectionId>,
    copy_id: &EntryId,
    at: OffsetDateTime,
) -> Note {
    Note {
        id: copy_id.clone(),
        content: original.content.clone(),
        created_at: original.created_at,
        order: original.order.clone(),
        collection_id: target.cloned(),
        collection_history: residency(target, at),
        migrated_to: None,
        migrated_from: Some(original.id.clone()),
        migrated_to_collection_id: None,
        migrated_from_collection_id: original.collection_id.clone(),
        deleted: false,
    }
}

fn migrated_journal_event(
    original: &JournalEvent,
    target: Option<&CollectionId>,
    copy_id: &EntryId,
    at: OffsetDateTime,
) -> JournalEvent {
    JournalEvent {
        id: copy_id.clone(),
        content: original.content.clone(),
        created_at: original.created_at,
        event_date: original.event_date.clone(),
        order: original.order.clone(),
        collection_id: target.cloned(),
        collection_history: residency(target, at),
        migrated_to: None,
        migrated_from: Some(original.id.clone()),
        migrated_to_collection_id: None,
        migrated_from_collection_id: original.collection_id.clone(),
        deleted: false,
    }
}
