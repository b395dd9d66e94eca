//! Narrow read model used by pure task-mode surfaces.
//!
//! Folds only task events, so notes, journal events, and entry moves never
//! enter this view.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use squickr_core::{DomainEvent, EntryId, EventKind, Task};
use squickr_store_mem::{CallbackRegistry, ChangeCallback, Subscription};
use time::OffsetDateTime;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::{CommandError, CommandResult};
use crate::event_store::EventStore;

/// Cached task-only read model.
pub struct TaskProjection<S: EventStore> {
    store: S,
    cache: Mutex<TaskCache>,
    dirty: Arc<AtomicBool>,
    subscribers: CallbackRegistry,
    _store_subscription: S::Subscription,
}

impl<S: EventStore> TaskProjection<S> {
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
            cache: Mutex::new(TaskCache::default()),
            dirty,
            subscribers,
            _store_subscription: subscription,
        }
    }

    /// Register a change listener re-notified on every store change.
    pub fn subscribe(&self, callback: ChangeCallback) -> Subscription {
        self.subscribers.register(callback)
    }

    /// Tasks that have not been deleted, in order.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn tasks(&self) -> CommandResult<Vec<Task>> {
        let cache = self.fresh_cache().await?;
        let mut tasks: Vec<Task> = cache
            .tasks
            .values()
            .filter(|task| !task.deleted)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        Ok(tasks)
    }

    /// Look up a task by id, original or migrated copy.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn task_by_id(&self, task_id: &EntryId) -> CommandResult<Option<Task>> {
        let cache = self.fresh_cache().await?;
        Ok(cache.tasks.get(task_id).cloned())
    }

    async fn fresh_cache(&self) -> CommandResult<MutexGuard<'_, TaskCache>> {
        let mut guard = self.cache.lock().await;
        if self.dirty.swap(false, Ordering::AcqRel) {
            let events = self.store.get_all().await.map_err(CommandError::store)?;
            *guard = TaskCache::fold(&events);
        }
        Ok(guard)
    }
}

#[derive(Default)]
struct TaskCache {
    tasks: HashMap<EntryId, Task>,
}

impl TaskCache {
    fn fold(events: &[DomainEvent]) -> Self {
        let mut cache = Self::default();
        for event in events {
            cache.apply(event);
        }
        cache
    }

    fn apply(&mut self, event: &DomainEvent) {
        if !event.kind.is_task_event() {
            return;
        }
        let task_id = EntryId::from(&event.aggregate_id);
        match &event.kind {
            EventKind::TaskCreated {
                title,
                collection_id,
                parent_entry_id,
                order,
                ..
            } => {
                self.tasks.insert(
                    task_id.clone(),
                    Task::from_created(
                        task_id,
                        event.timestamp,
                        title.clone(),
                        collection_id.clone(),
                        parent_entry_id.clone(),
                        order.clone(),
                    ),
                );
            }
            EventKind::TaskMigrated {
                target_collection_id,
                migrated_to_id,
            } => {
                let copy = match self.tasks.get_mut(&task_id) {
                    Some(original) => {
                        original.apply(event);
                        Some(migrated_copy(
                            original,
                            target_collection_id.as_ref().cloned(),
                            migrated_to_id,
                            event.timestamp,
                        ))
                    }
                    None => None,
                };
                if let Some(copy) = copy {
                    self.tasks.insert(migrated_to_id.clone(), copy);
                }
            }
            _ => {
                if let Some(task) = self.tasks.get_mut(&task_id) {
                    task.apply(event);
                }
            }
        }
    }
}

fn migrated_copy(
    original: &Task,
    target: Option<squickr_core::CollectionId>,
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
        collection_id: target.clone(),
        collections: target.clone().into_iter().collect(),
        collection_history: target
            .map(|collection_id| squickr_core::CollectionHistoryEntry {
                collection_id,
                added_at: at,
                removed_at: None,
            })
            .into_iter()
            .collect(),
        migrated_to: None,
        migrated_from: Some(original.id.clone()),
        migrated_to_collection_id: None,
        migrated_from_collection_id: original.collection_id.clone(),
        parent_entry_id: original.parent_entry_id.clone(),
        deleted: false,
    }
}
