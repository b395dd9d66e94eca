//! Task command handlers.
//!
//! Each method validates one user intent against current projection state
//! and appends the resulting events; commands that touch a parent and its
//! children append them as one atomic batch, so observers never see a
//! partial cascade.

use squickr_core::clock::SharedClock;
use squickr_core::text::normalize_title;
use squickr_core::{
    CollectionId, DomainEvent, EntryId, Entry, EventKind, Task, TaskStatus, key_between,
};
use tracing::{debug, info};

use crate::collection_projection::CollectionProjection;
use crate::entry_projection::EntryProjection;
use crate::error::{CommandError, CommandResult};
use crate::event_store::EventStore;
use crate::support::{ensure_target_live, next_version, reorder_key};

/// Validates task commands and emits task events.
pub struct TaskWriter<S: EventStore + Clone> {
    store: S,
    entries: EntryProjection<S>,
    collections: CollectionProjection<S>,
    clock: SharedClock,
}

impl<S: EventStore + Clone> TaskWriter<S> {
    /// Construct a writer over `store`, stamping events with `clock`.
    pub fn new(store: S, clock: SharedClock) -> Self {
        Self {
            entries: EntryProjection::new(store.clone()),
            collections: CollectionProjection::new(store.clone()),
            store,
            clock,
        }
    }

    /// Create a task, ordered after the last entry of any kind.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the title is invalid, the collection is
    /// deleted, or the append fails.
    pub async fn create_task(&self, request: CreateTaskRequest) -> CommandResult<EntryId> {
        let CreateTaskRequest {
            title,
            collection_id,
            user_id,
        } = request;
        let title = normalize_title(&title)?;
        ensure_target_live(&self.collections, collection_id.as_ref()).await?;

        let last = self.entries.last_entry_order().await?;
        let order = key_between(last.as_deref(), None)?;

        let task_id = EntryId::new();
        let event = DomainEvent::new(
            &task_id,
            1,
            self.clock.now(),
            EventKind::TaskCreated {
                title,
                collection_id,
                parent_entry_id: None,
                order,
                user_id,
            },
        );
        self.store.append(event).await.map_err(CommandError::store)?;
        info!(%task_id, "created task");
        Ok(task_id)
    }

    /// Create a sub-task under an existing task.
    ///
    /// The parent must be a task and must not itself be a sub-task (depth is
    /// limited to 2). The sub-task inherits the parent's current collection.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the parent is missing, not a task, or
    /// already a sub-task, or when the title is invalid.
    pub async fn create_sub_task(&self, request: CreateSubTaskRequest) -> CommandResult<EntryId> {
        let CreateSubTaskRequest {
            title,
            parent_entry_id,
            user_id,
        } = request;
        let title = normalize_title(&title)?;

        let parent = self
            .entries
            .entry_by_id(&parent_entry_id)
            .await?
            .filter(|entry| !entry.is_deleted())
            .ok_or_else(|| {
                CommandError::not_found(format!("parent entry {parent_entry_id} not found"))
            })?;
        let Entry::Task(parent_task) = &parent else {
            return Err(CommandError::validation(format!(
                "parent entry {parent_entry_id} is a {}, not a task",
                parent.kind_name()
            )));
        };
        if parent_task.is_sub_task() {
            return Err(CommandError::illegal(format!(
                "task {parent_entry_id} is itself a sub-task; sub-tasks cannot be nested"
            )));
        }

        let last = self.entries.last_entry_order().await?;
        let order = key_between(last.as_deref(), None)?;

        let task_id = EntryId::new();
        let event = DomainEvent::new(
            &task_id,
            1,
            self.clock.now(),
            EventKind::TaskCreated {
                title,
                collection_id: parent_task.collection_id.clone(),
                parent_entry_id: Some(parent_entry_id),
                order,
                user_id,
            },
        );
        self.store.append(event).await.map_err(CommandError::store)?;
        info!(%task_id, "created sub-task");
        Ok(task_id)
    }

    /// Complete an open task.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the task is missing or already
    /// completed.
    pub async fn complete_task(&self, task_id: &EntryId) -> CommandResult<()> {
        let task = self.require_task(task_id).await?;
        if task.status == TaskStatus::Completed {
            return Err(CommandError::illegal(format!(
                "task {task_id} is already completed"
            )));
        }

        let now = self.clock.now();
        let event = DomainEvent::new(
            task_id,
            next_version(&self.store, &task_id.into()).await?,
            now,
            EventKind::TaskCompleted { completed_at: now },
        );
        self.store.append(event).await.map_err(CommandError::store)?;
        Ok(())
    }

    /// Complete a parent task, cascading over incomplete children.
    ///
    /// With every child already complete this behaves as
    /// [`complete_task`](Self::complete_task). Otherwise the caller must
    /// confirm, and the children complete together with the parent in one
    /// atomic batch.
    ///
    /// # Errors
    /// Returns [`CommandError::NeedsConfirmation`] carrying the incomplete
    /// child count when `confirmed` is false and children would be touched.
    pub async fn complete_parent_task(
        &self,
        task_id: &EntryId,
        confirmed: bool,
    ) -> CommandResult<CascadeOutcome> {
        let task = self.require_task(task_id).await?;
        if task.status == TaskStatus::Completed {
            return Err(CommandError::illegal(format!(
                "task {task_id} is already completed"
            )));
        }

        let children = self.entries.sub_tasks(task_id).await?;
        let incomplete: Vec<Task> = children
            .into_iter()
            .filter(|child| child.status == TaskStatus::Open)
            .collect();

        if !incomplete.is_empty() && !confirmed {
            return Err(CommandError::NeedsConfirmation {
                incomplete_children: incomplete.len(),
            });
        }

        let now = self.clock.now();
        let mut events = Vec::with_capacity(incomplete.len() + 1);
        for child in &incomplete {
            events.push(DomainEvent::new(
                &child.id,
                next_version(&self.store, &(&child.id).into()).await?,
                now,
                EventKind::TaskCompleted { completed_at: now },
            ));
        }
        events.push(DomainEvent::new(
            task_id,
            next_version(&self.store, &task_id.into()).await?,
            now,
            EventKind::TaskCompleted { completed_at: now },
        ));

        self.store
            .append_batch(events)
            .await
            .map_err(CommandError::store)?;
        debug!(%task_id, cascaded = incomplete.len(), "completed parent task");
        Ok(CascadeOutcome {
            cascaded_children: incomplete.len(),
        })
    }

    /// Reopen a completed task.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the task is missing or still open.
    pub async fn reopen_task(&self, task_id: &EntryId) -> CommandResult<()> {
        let task = self.require_task(task_id).await?;
        if task.status == TaskStatus::Open {
            return Err(CommandError::illegal(format!("task {task_id} is not completed")));
        }

        let event = DomainEvent::new(
            task_id,
            next_version(&self.store, &task_id.into()).await?,
            self.clock.now(),
            EventKind::TaskReopened,
        );
        self.store.append(event).await.map_err(CommandError::store)?;
        Ok(())
    }

    /// Delete a task.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the task is missing or already deleted.
    pub async fn delete_task(&self, task_id: &EntryId) -> CommandResult<()> {
        self.require_task(task_id).await?;
        let event = DomainEvent::new(
            task_id,
            next_version(&self.store, &task_id.into()).await?,
            self.clock.now(),
            EventKind::TaskDeleted,
        );
        self.store.append(event).await.map_err(CommandError::store)?;
        Ok(())
    }

    /// Delete a parent task, cascading over its remaining children.
    ///
    /// Symmetric to [`complete_parent_task`](Self::complete_parent_task):
    /// with no children left this is a plain delete, otherwise the caller
    /// confirms and children are deleted with the parent in one batch.
    ///
    /// # Errors
    /// Returns [`CommandError::NeedsConfirmation`] carrying the child count
    /// when `confirmed` is false and children would be touched.
    pub async fn delete_parent_task(
        &self,
        task_id: &EntryId,
        confirmed: bool,
    ) -> CommandResult<CascadeOutcome> {
        self.require_task(task_id).await?;
        let children = self.entries.sub_tasks(task_id).await?;

        if !children.is_empty() && !confirmed {
            return Err(CommandError::NeedsConfirmation {
                incomplete_children: children.len(),
            });
        }

        let now = self.clock.now();
        let mut events = Vec::with_capacity(children.len() + 1);
        for child in &children {
            events.push(DomainEvent::new(
                &child.id,
                next_version(&self.store, &(&child.id).into()).await?,
                now,
                EventKind::TaskDeleted,
            ));
        }
        events.push(DomainEvent::new(
            task_id,
            next_version(&self.store, &task_id.into()).await?,
            now,
            EventKind::TaskDeleted,
        ));

        self.store
            .append_batch(events)
            .await
            .map_err(CommandError::store)?;
        debug!(%task_id, cascaded = children.len(), "deleted parent task");
        Ok(CascadeOutcome {
            cascaded_children: children.len(),
        })
    }

    /// Place a task between two neighbouring entries of any kind.
    ///
    /// Returns `false` without appending when the task already sits in the
    /// requested slot.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the task or a neighbour is missing.
    pub async fn reorder_task(&self, request: ReorderTaskRequest) -> CommandResult<bool> {
        let ReorderTaskRequest {
            task_id,
            previous_entry_id,
            next_entry_id,
        } = request;
        let task = self.require_task(&task_id).await?;

        let previous = match &previous_entry_id {
            Some(id) => Some(self.require_entry(id).await?.order().to_owned()),
            None => None,
        };
        let next = match &next_entry_id {
            Some(id) => Some(self.require_entry(id).await?.order().to_owned()),
            None => None,
        };

        let Some(order) = reorder_key(&task.order, previous.as_deref(), next.as_deref())? else {
            return Ok(false);
        };

        let event = DomainEvent::new(
            &task_id,
            next_version(&self.store, &(&task_id).into()).await?,
            self.clock.now(),
            EventKind::TaskReordered { order },
        );
        self.store.append(event).await.map_err(CommandError::store)?;
        Ok(true)
    }

    /// Overwrite a task's title.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the task is missing or the title is
    /// invalid.
    pub async fn update_task_title(&self, task_id: &EntryId, title: &str) -> CommandResult<()> {
        let title = normalize_title(title)?;
        self.require_task(task_id).await?;

        let event = DomainEvent::new(
            task_id,
            next_version(&self.store, &task_id.into()).await?,
            self.clock.now(),
            EventKind::TaskTitleChanged { title },
        );
        self.store.append(event).await.map_err(CommandError::store)?;
        Ok(())
    }

    /// Add a task to an additional collection.
    ///
    /// Returns `false` without appending when the task is already a member.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the task is missing or the collection
    /// is deleted.
    pub async fn add_task_to_collection(
        &self,
        task_id: &EntryId,
        collection_id: &CollectionId,
    ) -> CommandResult<bool> {
        let task = self.require_task(task_id).await?;
        ensure_target_live(&self.collections, Some(collection_id)).await?;
        if task.collections.contains(collection_id) {
            return Ok(false);
        }

        let event = DomainEvent::new(
            task_id,
            next_version(&self.store, &task_id.into()).await?,
            self.clock.now(),
            EventKind::TaskAddedToCollection {
                collection_id: collection_id.clone(),
            },
        );
        self.store.append(event).await.map_err(CommandError::store)?;
        Ok(true)
    }

    /// Remove a task from one of its collections. Removing the last
    /// membership leaves the task orphaned but retrievable.
    ///
    /// Returns `false` without appending when the task is not a member.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the task is missing.
    pub async fn remove_task_from_collection(
        &self,
        task_id: &EntryId,
        collection_id: &CollectionId,
    ) -> CommandResult<bool> {
        let task = self.require_task(task_id).await?;
        if !task.collections.contains(collection_id) {
            return Ok(false);
        }

        let event = DomainEvent::new(
            task_id,
            next_version(&self.store, &task_id.into()).await?,
            self.clock.now(),
            EventKind::TaskRemovedFromCollection {
                collection_id: collection_id.clone(),
            },
        );
        self.store.append(event).await.map_err(CommandError::store)?;
        Ok(true)
    }

    /// Migrate a task to another collection, bullet-journal style.
    ///
    /// The original becomes a ghost in its source collection; an active copy
    /// with a fresh id appears in the target. Children are migrated in the
    /// same batch, each with its own fresh copy — including children that
    /// were migrated before, which is how a parent migration produces the
    /// symlink-like extra records.
    ///
    /// Re-migrating to the same target returns the previously issued copy id
    /// without appending; re-migrating to a different target fails.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the task is missing, already migrated
    /// elsewhere, or the target collection is deleted.
    pub async fn migrate_task(
        &self,
        task_id: &EntryId,
        target_collection_id: Option<&CollectionId>,
    ) -> CommandResult<MigrateTaskOutcome> {
        let task = self.require_task(task_id).await?;
        ensure_target_live(&self.collections, target_collection_id).await?;

        if let Some(existing) = &task.migrated_to {
            if task.migrated_to_collection_id.as_ref() == target_collection_id {
                return Ok(MigrateTaskOutcome {
                    migrated_to: existing.clone(),
                    changed: false,
                    cascaded_children: 0,
                });
            }
            return Err(CommandError::illegal(format!(
                "task {task_id} was already migrated to a different collection"
            )));
        }

        let now = self.clock.now();
        let migrated_to = EntryId::new();
        let mut events = vec![DomainEvent::new(
            task_id,
            next_version(&self.store, &task_id.into()).await?,
            now,
            EventKind::TaskMigrated {
                target_collection_id: target_collection_id.cloned(),
                migrated_to_id: migrated_to.clone(),
            },
        )];

        let children = self.entries.sub_tasks(task_id).await?;
        for child in &children {
            events.push(DomainEvent::new(
                &child.id,
                next_version(&self.store, &(&child.id).into()).await?,
                now,
                EventKind::TaskMigrated {
                    target_collection_id: target_collection_id.cloned(),
                    migrated_to_id: EntryId::new(),
                },
            ));
        }

        self.store
            .append_batch(events)
            .await
            .map_err(CommandError::store)?;
        info!(%task_id, %migrated_to, cascaded = children.len(), "migrated task");
        Ok(MigrateTaskOutcome {
            migrated_to,
            changed: true,
            cascaded_children: children.len(),
        })
    }

    /// Borrow the projection this writer validates against.
    pub const fn entries(&self) -> &EntryProjection<S> {
        &self.entries
    }

    async fn require_task(&self, task_id: &EntryId) -> CommandResult<Task> {
        self.entries
            .task_by_id(task_id)
            .await?
            .filter(|task| !task.deleted)
            .ok_or_else(|| CommandError::not_found(format!("task {task_id} not found")))
    }

    async fn require_entry(&self, entry_id: &EntryId) -> CommandResult<Entry> {
        self.entries
            .entry_by_id(entry_id)
            .await?
            .filter(|entry| !entry.is_deleted())
            .ok_or_else(|| CommandError::not_found(format!("entry {entry_id} not found")))
    }
}

/// Payload for creating a task.
#[derive(Debug, Clone)]
pub struct CreateTaskRequest {
    /// Raw title; trimmed and length-checked by the writer.
    pub title: String,
    /// Collection the task starts in, if any.
    pub collection_id: Option<CollectionId>,
    /// User issuing the command.
    pub user_id: Option<String>,
}

/// Payload for creating a sub-task.
#[derive(Debug, Clone)]
pub struct CreateSubTaskRequest {
    /// Raw title; trimmed and length-checked by the writer.
    pub title: String,
    /// Parent task; must not itself be a sub-task.
    pub parent_entry_id: EntryId,
    /// User issuing the command.
    pub user_id: Option<String>,
}

/// Payload for reordering a task between two neighbouring entries.
#[derive(Debug, Clone)]
pub struct ReorderTaskRequest {
    /// Task to reorder.
    pub task_id: EntryId,
    /// Entry to land after, `None` for the start.
    pub previous_entry_id: Option<EntryId>,
    /// Entry to land before, `None` for the end.
    pub next_entry_id: Option<EntryId>,
}

/// Result of a cascading completion or deletion.
#[derive(Debug, Clone, Copy)]
pub struct CascadeOutcome {
    /// Children touched alongside the parent.
    pub cascaded_children: usize,
}

/// Result of a task migration.
#[derive(Debug, Clone)]
pub struct MigrateTaskOutcome {
    /// Id of the active copy in the target collection.
    pub migrated_to: EntryId,
    /// Whether any event was appended (`false` for an idempotent repeat).
    pub changed: bool,
    /// Children migrated in the same batch.
    pub cascaded_children: usize,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use squickr_core::clock::ManualClock;
    use squickr_store_mem::MemoryEventStore;
    use std::sync::Arc;
    use time::macros::datetime;

    fn writer() -> TaskWriter<MemoryEventStore> {
        let clock = Arc::new(ManualClock::new(datetime!(2026-02-01 09:00:00 UTC)));
        let store = MemoryEventStore::with_clock(clock.clone());
        TaskWriter::new(store, clock)
    }

    fn create(title: &str) -> CreateTaskRequest {
        CreateTaskRequest {
            title: title.into(),
            collection_id: None,
            user_id: None,
        }
    }

    #[tokio::test]
    async fn blank_titles_are_rejected_before_any_append() {
        let writer = writer();
        let err = writer.create_task(create("   ")).await.unwrap_err();
        assert!(matches!(err, CommandError::Validation(_)));
        assert!(writer.entries().entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn completing_twice_is_an_illegal_transition() {
        let writer = writer();
        let task = writer.create_task(create("Buy milk")).await.unwrap();
        writer.complete_task(&task).await.unwrap();

        let err = writer.complete_task(&task).await.unwrap_err();
        assert!(matches!(err, CommandError::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn reopening_an_open_task_fails() {
        let writer = writer();
        let task = writer.create_task(create("Buy milk")).await.unwrap();
        let err = writer.reopen_task(&task).await.unwrap_err();
        assert!(matches!(err, CommandError::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn sub_task_depth_is_limited_to_two() {
        let writer = writer();
        let parent = writer.create_task(create("Parent")).await.unwrap();
        let child = writer
            .create_sub_task(CreateSubTaskRequest {
                title: "Child".into(),
                parent_entry_id: parent,
                user_id: None,
            })
            .await
            .unwrap();

        let err = writer
            .create_sub_task(CreateSubTaskRequest {
                title: "Grandchild".into(),
                parent_entry_id: child,
                user_id: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn unconfirmed_parent_completion_reports_the_child_count() {
        let writer = writer();
        let parent = writer.create_task(create("Parent")).await.unwrap();
        for title in ["a", "b", "c"] {
            writer
                .create_sub_task(CreateSubTaskRequest {
                    title: title.into(),
                    parent_entry_id: parent.clone(),
                    user_id: None,
                })
                .await
                .unwrap();
        }

        let err = writer.complete_parent_task(&parent, false).await.unwrap_err();
        assert!(matches!(
            err,
            CommandError::NeedsConfirmation {
                incomplete_children: 3
            }
        ));

        let outcome = writer.complete_parent_task(&parent, true).await.unwrap();
        assert_eq!(outcome.cascaded_children, 3);
    }

    #[tokio::test]
    async fn parent_completion_with_all_children_done_needs_no_confirmation() {
        let writer = writer();
        let parent = writer.create_task(create("Parent")).await.unwrap();
        let child = writer
            .create_sub_task(CreateSubTaskRequest {
                title: "Child".into(),
                parent_entry_id: parent.clone(),
                user_id: None,
            })
            .await
            .unwrap();
        writer.complete_task(&child).await.unwrap();

        let outcome = writer.complete_parent_task(&parent, false).await.unwrap();
        assert_eq!(outcome.cascaded_children, 0);
    }

    #[tokio::test]
    async fn re_migration_is_idempotent_for_the_same_target_only() {
        let writer = writer();
        let task = writer.create_task(create("Ship it")).await.unwrap();
        let target = CollectionId::from_string("col-b");

        let first = writer.migrate_task(&task, Some(&target)).await.unwrap();
        assert!(first.changed);

        let second = writer.migrate_task(&task, Some(&target)).await.unwrap();
        assert!(!second.changed);
        assert_eq!(second.migrated_to, first.migrated_to);

        let err = writer
            .migrate_task(&task, Some(&CollectionId::from_string("col-c")))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn adding_to_a_collection_twice_appends_nothing() {
        let writer = writer();
        let task = writer.create_task(create("Task")).await.unwrap();
        let collection = CollectionId::from_string("daily-log");

        assert!(writer.add_task_to_collection(&task, &collection).await.unwrap());
        assert!(!writer.add_task_to_collection(&task, &collection).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_tasks_are_reported_as_not_found() {
        let writer = writer();
        let err = writer.complete_task(&EntryId::new()).await.unwrap_err();
        assert!(matches!(err, CommandError::NotFound(_)));
    }
}
