use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::collection::CollectionHistoryEntry;
use crate::event::{DomainEvent, EventKind};
use crate::id::{CollectionId, EntryId};

/// Lifecycle state of a task.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Still to be done.
    #[default]
    Open,
    /// Done; `completed_at` records when.
    Completed,
}

/// Materialized task state, derived by replaying its events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Identifier (also the aggregate id).
    pub id: EntryId,
    /// Display title.
    pub title: String,
    /// Creation instant.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Open or completed.
    pub status: TaskStatus,
    /// Completion instant; set exactly when `status` is completed.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    /// Fractional-index order key, shared across all entry kinds.
    pub order: String,
    /// Primary collection (legacy single-collection pointer).
    pub collection_id: Option<CollectionId>,
    /// Multi-collection memberships.
    pub collections: Vec<CollectionId>,
    /// Residency history across collections.
    pub collection_history: Vec<CollectionHistoryEntry>,
    /// Id of the active copy this task was migrated into.
    pub migrated_to: Option<EntryId>,
    /// Id of the original this task was migrated from.
    pub migrated_from: Option<EntryId>,
    /// Collection the migrated copy lives in.
    pub migrated_to_collection_id: Option<CollectionId>,
    /// Collection the original lived in at migration time.
    pub migrated_from_collection_id: Option<CollectionId>,
    /// Parent task for sub-tasks (depth is limited to 2).
    pub parent_entry_id: Option<EntryId>,
    /// Whether the task was deleted.
    pub deleted: bool,
}

impl Task {
    /// Build the initial state from a `TaskCreated` event's fields.
    #[must_use]
    pub fn from_created(
        id: EntryId,
        created_at: OffsetDateTime,
        title: String,
        collection_id: Option<CollectionId>,
        parent_entry_id: Option<EntryId>,
        order: String,
    ) -> Self {
        let collections = collection_id.iter().cloned().collect();
        let collection_history = open_history(collection_id.as_ref(), created_at);
        Self {
            id,
            title,
            created_at,
            status: TaskStatus::Open,
            completed_at: None,
            order,
            collection_id,
            collections,
            collection_history,
            migrated_to: None,
            migrated_from: None,
            migrated_to_collection_id: None,
            migrated_from_collection_id: None,
            parent_entry_id,
            deleted: false,
        }
    }

    /// Apply one event to this task. Events of unrelated kinds are ignored.
    pub fn apply(&mut self, event: &DomainEvent) {
        match &event.kind {
            EventKind::TaskCompleted { completed_at } => {
                self.status = TaskStatus::Completed;
                self.completed_at = Some(*completed_at);
            }
            EventKind::TaskReopened => {
                self.status = TaskStatus::Open;
                self.completed_at = None;
            }
            EventKind::TaskDeleted => {
                self.deleted = true;
            }
            EventKind::TaskReordered { order } => {
                self.order.clone_from(order);
            }
            EventKind::TaskTitleChanged { title } => {
                self.title.clone_from(title);
            }
            EventKind::TaskMigrated {
                target_collection_id,
                migrated_to_id,
            } => {
                self.migrated_to = Some(migrated_to_id.clone());
                self.migrated_to_collection_id = target_collection_id.clone();
            }
            EventKind::TaskAddedToCollection { collection_id } => {
                if !self.collections.contains(collection_id) {
                    self.collections.push(collection_id.clone());
                    self.collection_history.push(CollectionHistoryEntry {
                        collection_id: collection_id.clone(),
                        added_at: event.timestamp,
                        removed_at: None,
                    });
                }
            }
            EventKind::TaskRemovedFromCollection { collection_id } => {
                self.collections.retain(|c| c != collection_id);
                close_history_for(&mut self.collection_history, collection_id, event.timestamp);
            }
            EventKind::EntryMovedToCollection { collection_id } => {
                close_all_open(&mut self.collection_history, event.timestamp);
                self.collection_id = collection_id.clone();
                self.collections = collection_id.iter().cloned().collect();
                if let Some(target) = collection_id {
                    self.collection_history.push(CollectionHistoryEntry {
                        collection_id: target.clone(),
                        added_at: event.timestamp,
                        removed_at: None,
                    });
                }
            }
            _ => {}
        }
    }

    /// Whether this task is itself a sub-task.
    #[must_use]
    pub const fn is_sub_task(&self) -> bool {
        self.parent_entry_id.is_some()
    }

    /// Whether this task currently resides in `collection_id`, via either the
    /// membership list or the legacy primary pointer.
    #[must_use]
    pub fn is_in_collection(&self, collection_id: &CollectionId) -> bool {
        self.collections.contains(collection_id)
            || self.collection_id.as_ref() == Some(collection_id)
    }
}

/// Materialized note state.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Identifier (also the aggregate id).
    pub id: EntryId,
    /// Note body.
    pub content: String,
    /// Creation instant.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Fractional-index order key, shared across all entry kinds.
    pub order: String,
    /// Collection the note lives in.
    pub collection_id: Option<CollectionId>,
    /// Residency history across collections.
    pub collection_history: Vec<CollectionHistoryEntry>,
    /// Id of the active copy this note was migrated into.
    pub migrated_to: Option<EntryId>,
    /// Id of the original this note was migrated from.
    pub migrated_from: Option<EntryId>,
    /// Collection the migrated copy lives in.
    pub migrated_to_collection_id: Option<CollectionId>,
    /// Collection the original lived in at migration time.
    pub migrated_from_collection_id: Option<CollectionId>,
    /// Whether the note was deleted.
    pub deleted: bool,
}

impl Note {
    /// Build the initial state from a `NoteCreated` event's fields.
    #[must_use]
    pub fn from_created(
        id: EntryId,
        created_at: OffsetDateTime,
        content: String,
        collection_id: Option<CollectionId>,
        order: String,
    ) -> Self {
        let collection_history = open_history(collection_id.as_ref(), created_at);
        Self {
            id,
            content,
            created_at,
            order,
            collection_id,
            collection_history,
            migrated_to: None,
            migrated_from: None,
            migrated_to_collection_id: None,
            migrated_from_collection_id: None,
            deleted: false,
        }
    }

    /// Apply one event to this note. Events of unrelated kinds are ignored.
    pub fn apply(&mut self, event: &DomainEvent) {
        match &event.kind {
            EventKind::NoteContentChanged { content } => {
                self.content.clone_from(content);
            }
            EventKind::NoteDeleted => {
                self.deleted = true;
            }
            EventKind::NoteReordered { order } => {
                self.order.clone_from(order);
            }
            EventKind::NoteMigrated {
                target_collection_id,
                migrated_to_id,
            } => {
                self.migrated_to = Some(migrated_to_id.clone());
                self.migrated_to_collection_id = target_collection_id.clone();
            }
            EventKind::EntryMovedToCollection { collection_id } => {
                close_all_open(&mut self.collection_history, event.timestamp);
                self.collection_id = collection_id.clone();
                if let Some(target) = collection_id {
                    self.collection_history.push(CollectionHistoryEntry {
                        collection_id: target.clone(),
                        added_at: event.timestamp,
                        removed_at: None,
                    });
                }
            }
            _ => {}
        }
    }
}

/// Materialized journal-event state (a dated occurrence, not a log record).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEvent {
    /// Identifier (also the aggregate id).
    pub id: EntryId,
    /// Event body.
    pub content: String,
    /// Creation instant.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Day the event takes place, `YYYY-MM-DD`.
    pub event_date: Option<String>,
    /// Fractional-index order key, shared across all entry kinds.
    pub order: String,
    /// Collection the event lives in.
    pub collection_id: Option<CollectionId>,
    /// Residency history across collections.
    pub collection_history: Vec<CollectionHistoryEntry>,
    /// Id of the active copy this event was migrated into.
    pub migrated_to: Option<EntryId>,
    /// Id of the original this event was migrated from.
    pub migrated_from: Option<EntryId>,
    /// Collection the migrated copy lives in.
    pub migrated_to_collection_id: Option<CollectionId>,
    /// Collection the original lived in at migration time.
    pub migrated_from_collection_id: Option<CollectionId>,
    /// Whether the event was deleted.
    pub deleted: bool,
}

impl JournalEvent {
    /// Build the initial state from an `EventCreated` event's fields.
    #[must_use]
    pub fn from_created(
        id: EntryId,
        created_at: OffsetDateTime,
        content: String,
        event_date: Option<String>,
        collection_id: Option<CollectionId>,
        order: String,
    ) -> Self {
        let collection_history = open_history(collection_id.as_ref(), created_at);
        Self {
            id,
            content,
            created_at,
            event_date,
            order,
            collection_id,
            collection_history,
            migrated_to: None,
            migrated_from: None,
            migrated_to_collection_id: None,
            migrated_from_collection_id: None,
            deleted: false,
        }
    }

    /// Apply one event to this journal event. Unrelated kinds are ignored.
    pub fn apply(&mut self, event: &DomainEvent) {
        match &event.kind {
            EventKind::EventContentChanged { content } => {
                self.content.clone_from(content);
            }
            EventKind::EventDeleted => {
                self.deleted = true;
            }
            EventKind::EventReordered { order } => {
                self.order.clone_from(order);
            }
            EventKind::EventMigrated {
                target_collection_id,
                migrated_to_id,
            } => {
                self.migrated_to = Some(migrated_to_id.clone());
                self.migrated_to_collection_id = target_collection_id.clone();
            }
            EventKind::EntryMovedToCollection { collection_id } => {
                close_all_open(&mut self.collection_history, event.timestamp);
                self.collection_id = collection_id.clone();
                if let Some(target) = collection_id {
                    self.collection_history.push(CollectionHistoryEntry {
                        collection_id: target.clone(),
                        added_at: event.timestamp,
                        removed_at: None,
                    });
                }
            }
            _ => {}
        }
    }
}

/// Any journal entry, tagged by kind.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Entry {
    /// A task.
    Task(Task),
    /// A note.
    Note(Note),
    /// A dated event.
    Event(JournalEvent),
}

impl Entry {
    /// Identifier of the entry.
    #[must_use]
    pub const fn id(&self) -> &EntryId {
        match self {
            Self::Task(task) => &task.id,
            Self::Note(note) => &note.id,
            Self::Event(event) => &event.id,
        }
    }

    /// Order key of the entry; all kinds share one order space.
    #[must_use]
    pub fn order(&self) -> &str {
        match self {
            Self::Task(task) => &task.order,
            Self::Note(note) => &note.order,
            Self::Event(event) => &event.order,
        }
    }

    /// Primary collection the entry lives in.
    #[must_use]
    pub const fn collection_id(&self) -> Option<&CollectionId> {
        match self {
            Self::Task(task) => task.collection_id.as_ref(),
            Self::Note(note) => note.collection_id.as_ref(),
            Self::Event(event) => event.collection_id.as_ref(),
        }
    }

    /// Residency history of the entry.
    #[must_use]
    pub fn collection_history(&self) -> &[CollectionHistoryEntry] {
        match self {
            Self::Task(task) => &task.collection_history,
            Self::Note(note) => &note.collection_history,
            Self::Event(event) => &event.collection_history,
        }
    }

    /// Id of the active copy this entry was migrated into.
    #[must_use]
    pub const fn migrated_to(&self) -> Option<&EntryId> {
        match self {
            Self::Task(task) => task.migrated_to.as_ref(),
            Self::Note(note) => note.migrated_to.as_ref(),
            Self::Event(event) => event.migrated_to.as_ref(),
        }
    }

    /// Collection the migrated copy lives in.
    #[must_use]
    pub const fn migrated_to_collection_id(&self) -> Option<&CollectionId> {
        match self {
            Self::Task(task) => task.migrated_to_collection_id.as_ref(),
            Self::Note(note) => note.migrated_to_collection_id.as_ref(),
            Self::Event(event) => event.migrated_to_collection_id.as_ref(),
        }
    }

    /// Whether the entry was deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        match self {
            Self::Task(task) => task.deleted,
            Self::Note(note) => note.deleted,
            Self::Event(event) => event.deleted,
        }
    }

    /// Whether the entry currently resides in `collection_id`.
    #[must_use]
    pub fn is_in_collection(&self, collection_id: &CollectionId) -> bool {
        match self {
            Self::Task(task) => task.is_in_collection(collection_id),
            Self::Note(note) => note.collection_id.as_ref() == Some(collection_id),
            Self::Event(event) => event.collection_id.as_ref() == Some(collection_id),
        }
    }

    /// Short kind label for messages.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Task(_) => "task",
            Self::Note(_) => "note",
            Self::Event(_) => "event",
        }
    }

    /// Borrow the task variant, if this entry is one.
    #[must_use]
    pub const fn as_task(&self) -> Option<&Task> {
        match self {
            Self::Task(task) => Some(task),
            _ => None,
        }
    }

    /// Apply one event to this entry, dispatching on the entry kind.
    pub fn apply(&mut self, event: &DomainEvent) {
        match self {
            Self::Task(task) => task.apply(event),
            Self::Note(note) => note.apply(event),
            Self::Event(journal_event) => journal_event.apply(event),
        }
    }
}

fn open_history(
    collection_id: Option<&CollectionId>,
    added_at: OffsetDateTime,
) -> Vec<CollectionHistoryEntry> {
    collection_id
        .map(|id| CollectionHistoryEntry {
            collection_id: id.clone(),
            added_at,
            removed_at: None,
        })
        .into_iter()
        .collect()
}

fn close_history_for(
    history: &mut [CollectionHistoryEntry],
    collection_id: &CollectionId,
    at: OffsetDateTime,
) {
    for row in history
        .iter_mut()
        .filter(|row| &row.collection_id == collection_id && row.removed_at.is_none())
    {
        row.removed_at = Some(at);
    }
}

fn close_all_open(history: &mut [CollectionHistoryEntry], at: OffsetDateTime) {
    for row in history.iter_mut().filter(|row| row.removed_at.is_none()) {
        row.removed_at = Some(at);
    }
}
