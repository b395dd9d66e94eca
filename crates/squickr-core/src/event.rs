use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::collection::{CollectionSettings, CollectionType};
use crate::id::{AggregateId, CollectionId, EntryId, EventId};

/// One immutable record of the append-only log.
///
/// The serialized shape is canonical across implementations: `id`, `type`,
/// `aggregateId`, `version` (monotonic per aggregate, starting at 1),
/// `timestamp` (RFC 3339 UTC, millisecond precision), and a `payload`
/// determined by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    /// Unique identifier of this record.
    pub id: EventId,
    /// Entity the event concerns.
    pub aggregate_id: AggregateId,
    /// Per-aggregate version, starting at 1.
    pub version: u64,
    /// Wall-clock instant the event was produced.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Tagged payload.
    #[serde(flatten)]
    pub kind: EventKind,
}

impl DomainEvent {
    /// Create a new event with a fresh record id.
    pub fn new(
        aggregate_id: impl Into<AggregateId>,
        version: u64,
        timestamp: OffsetDateTime,
        kind: EventKind,
    ) -> Self {
        Self {
            id: EventId::new(),
            aggregate_id: aggregate_id.into(),
            version,
            timestamp,
            kind,
        }
    }
}

/// Domain event payloads, tagged by event type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all_fields = "camelCase")]
pub enum EventKind {
    // -- Task events ------------------------------------------------------
    /// A new task entered the journal.
    TaskCreated {
        /// Trimmed title.
        title: String,
        /// Collection the task starts in, if any.
        #[serde(default)]
        collection_id: Option<CollectionId>,
        /// Parent task for sub-tasks.
        #[serde(default)]
        parent_entry_id: Option<EntryId>,
        /// Fractional-index order key.
        order: String,
        /// User who issued the command.
        #[serde(default)]
        user_id: Option<String>,
    },
    /// An open task was completed.
    TaskCompleted {
        /// Completion instant.
        #[serde(with = "time::serde::rfc3339")]
        completed_at: OffsetDateTime,
    },
    /// A completed task was reopened.
    TaskReopened,
    /// The task was deleted.
    TaskDeleted,
    /// The task was placed between new neighbours.
    TaskReordered {
        /// New order key.
        order: String,
    },
    /// The task title was overwritten.
    TaskTitleChanged {
        /// New trimmed title.
        title: String,
    },
    /// The task was migrated to another collection, leaving a ghost behind.
    TaskMigrated {
        /// Destination collection (`None` migrates out of all collections).
        #[serde(default)]
        target_collection_id: Option<CollectionId>,
        /// Identifier of the active copy created in the destination.
        migrated_to_id: EntryId,
    },
    /// The task joined an additional collection.
    TaskAddedToCollection {
        /// Collection joined.
        collection_id: CollectionId,
    },
    /// The task left one of its collections.
    TaskRemovedFromCollection {
        /// Collection left.
        collection_id: CollectionId,
    },

    // -- Note events ------------------------------------------------------
    /// A new note entered the journal.
    NoteCreated {
        /// Trimmed content.
        content: String,
        /// Collection the note starts in, if any.
        #[serde(default)]
        collection_id: Option<CollectionId>,
        /// Fractional-index order key.
        order: String,
    },
    /// The note content was overwritten.
    NoteContentChanged {
        /// New trimmed content.
        content: String,
    },
    /// The note was deleted.
    NoteDeleted,
    /// The note was placed between new neighbours.
    NoteReordered {
        /// New order key.
        order: String,
    },
    /// The note was migrated to another collection.
    NoteMigrated {
        /// Destination collection.
        #[serde(default)]
        target_collection_id: Option<CollectionId>,
        /// Identifier of the active copy created in the destination.
        migrated_to_id: EntryId,
    },

    // -- Journal event events ---------------------------------------------
    /// A new event entry entered the journal.
    EventCreated {
        /// Trimmed content.
        content: String,
        /// Day the event takes place, `YYYY-MM-DD`.
        #[serde(default)]
        event_date: Option<String>,
        /// Collection the event starts in, if any.
        #[serde(default)]
        collection_id: Option<CollectionId>,
        /// Fractional-index order key.
        order: String,
    },
    /// The event content was overwritten.
    EventContentChanged {
        /// New trimmed content.
        content: String,
    },
    /// The event entry was deleted.
    EventDeleted,
    /// The event entry was placed between new neighbours.
    EventReordered {
        /// New order key.
        order: String,
    },
    /// The event entry was migrated to another collection.
    EventMigrated {
        /// Destination collection.
        #[serde(default)]
        target_collection_id: Option<CollectionId>,
        /// Identifier of the active copy created in the destination.
        migrated_to_id: EntryId,
    },

    // -- Entry-generic events ---------------------------------------------
    /// The entry was relocated to another collection (or out of all of them).
    EntryMovedToCollection {
        /// Destination collection, `None` for no collection.
        #[serde(default)]
        collection_id: Option<CollectionId>,
    },

    // -- Collection events -------------------------------------------------
    /// A new collection was created.
    CollectionCreated {
        /// Trimmed display name.
        name: String,
        /// Kind of collection.
        collection_type: CollectionType,
        /// Date key, format tied to the collection type.
        #[serde(default)]
        date: Option<String>,
        /// Fractional-index order key.
        order: String,
        /// User who issued the command.
        #[serde(default)]
        user_id: Option<String>,
    },
    /// The collection was renamed.
    CollectionRenamed {
        /// New trimmed name.
        name: String,
    },
    /// The collection was placed between new neighbours.
    CollectionReordered {
        /// New order key.
        order: String,
    },
    /// The collection was soft-deleted.
    CollectionDeleted,
    /// A soft-deleted collection was brought back.
    CollectionRestored,
    /// The collection settings were overwritten.
    CollectionSettingsUpdated {
        /// New settings, stored exactly as written.
        settings: CollectionSettings,
    },
    /// The collection was marked as a favorite.
    CollectionFavorited,
    /// The favorite mark was removed.
    CollectionUnfavorited,
    /// The collection was opened by the user.
    CollectionAccessed {
        /// Access instant.
        #[serde(with = "time::serde::rfc3339")]
        accessed_at: OffsetDateTime,
    },
}

impl EventKind {
    /// Stable name of the event type, as it appears in the serialized `type`
    /// tag. Useful for logging.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::TaskCreated { .. } => "TaskCreated",
            Self::TaskCompleted { .. } => "TaskCompleted",
            Self::TaskReopened => "TaskReopened",
            Self::TaskDeleted => "TaskDeleted",
            Self::TaskReordered { .. } => "TaskReordered",
            Self::TaskTitleChanged { .. } => "TaskTitleChanged",
            Self::TaskMigrated { .. } => "TaskMigrated",
            Self::TaskAddedToCollection { .. } => "TaskAddedToCollection",
            Self::TaskRemovedFromCollection { .. } => "TaskRemovedFromCollection",
            Self::NoteCreated { .. } => "NoteCreated",
            Self::NoteContentChanged { .. } => "NoteContentChanged",
            Self::NoteDeleted => "NoteDeleted",
            Self::NoteReordered { .. } => "NoteReordered",
            Self::NoteMigrated { .. } => "NoteMigrated",
            Self::EventCreated { .. } => "EventCreated",
            Self::EventContentChanged { .. } => "EventContentChanged",
            Self::EventDeleted => "EventDeleted",
            Self::EventReordered { .. } => "EventReordered",
            Self::EventMigrated { .. } => "EventMigrated",
            Self::EntryMovedToCollection { .. } => "EntryMovedToCollection",
            Self::CollectionCreated { .. } => "CollectionCreated",
            Self::CollectionRenamed { .. } => "CollectionRenamed",
            Self::CollectionReordered { .. } => "CollectionReordered",
            Self::CollectionDeleted => "CollectionDeleted",
            Self::CollectionRestored => "CollectionRestored",
            Self::CollectionSettingsUpdated { .. } => "CollectionSettingsUpdated",
            Self::CollectionFavorited => "CollectionFavorited",
            Self::CollectionUnfavorited => "CollectionUnfavorited",
            Self::CollectionAccessed { .. } => "CollectionAccessed",
        }
    }

    /// Whether this event belongs to a collection aggregate.
    #[must_use]
    pub const fn is_collection_event(&self) -> bool {
        matches!(
            self,
            Self::CollectionCreated { .. }
                | Self::CollectionRenamed { .. }
                | Self::CollectionReordered { .. }
                | Self::CollectionDeleted
                | Self::CollectionRestored
                | Self::CollectionSettingsUpdated { .. }
                | Self::CollectionFavorited
                | Self::CollectionUnfavorited
                | Self::CollectionAccessed { .. }
        )
    }

    /// Whether this event belongs to an entry aggregate (task, note, or
    /// event), including the entry-generic move.
    #[must_use]
    pub const fn is_entry_event(&self) -> bool {
        !self.is_collection_event()
    }

    /// Whether this event belongs to a task aggregate specifically.
    #[must_use]
    pub const fn is_task_event(&self) -> bool {
        matches!(
            self,
            Self::TaskCreated { .. }
                | Self::TaskCompleted { .. }
                | Self::TaskReopened
                | Self::TaskDeleted
                | Self::TaskReordered { .. }
                | Self::TaskTitleChanged { .. }
                | Self::TaskMigrated { .. }
                | Self::TaskAddedToCollection { .. }
                | Self::TaskRemovedFromCollection { .. }
        )
    }
}
