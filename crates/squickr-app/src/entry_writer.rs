//! Note and journal-event command handlers, plus the entry-generic move.
//!
//! Moving is polymorphic over the entry kind: notes and events relocate
//! alone, while a task drags every one of its children along in the same
//! atomic batch — children belong to their parent, not to a collection.

use squickr_core::clock::SharedClock;
use squickr_core::text::normalize_content;
use squickr_core::{
    CollectionId, DomainEvent, Entry, EntryId, EventKind, JournalEvent, Note, key_between,
};
use tracing::{debug, info};

use crate::collection_projection::CollectionProjection;
use crate::entry_projection::EntryProjection;
use crate::error::{CommandError, CommandResult};
use crate::event_store::EventStore;
use crate::support::{ensure_target_live, next_version, reorder_key};

/// Validates note, event, and entry-generic commands and emits their events.
pub struct EntryWriter<S: EventStore + Clone> {
    store: S,
    entries: EntryProjection<S>,
    collections: CollectionProjection<S>,
    clock: SharedClock,
}

impl<S: EventStore + Clone> EntryWriter<S> {
    /// Construct a writer over `store`, stamping events with `clock`.
    pub fn new(store: S, clock: SharedClock) -> Self {
        Self {
            entries: EntryProjection::new(store.clone()),
            collections: CollectionProjection::new(store.clone()),
            store,
            clock,
        }
    }

    /// Create a note, ordered after the last entry of any kind.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the content is invalid, the collection
    /// is deleted, or the append fails.
    pub async fn create_note(&self, request: CreateNoteRequest) -> CommandResult<EntryId> {
        let CreateNoteRequest {
            content,
            collection_id,
        } = request;
        let content = normalize_content(&content)?;
        ensure_target_live(&self.collections, collection_id.as_ref()).await?;

        let last = self.entries.last_entry_order().await?;
        let order = key_between(last.as_deref(), None)?;

        let note_id = EntryId::new();
        let event = DomainEvent::new(
            &note_id,
            1,
            self.clock.now(),
            EventKind::NoteCreated {
                content,
                collection_id,
                order,
            },
        );
        self.store.append(event).await.map_err(CommandError::store)?;
        info!(%note_id, "created note");
        Ok(note_id)
    }

    /// Overwrite a note's content.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the note is missing or the content is
    /// invalid.
    pub async fn update_note_content(&self, note_id: &EntryId, content: &str) -> CommandResult<()> {
        let content = normalize_content(content)?;
        self.require_note(note_id).await?;

        let event = DomainEvent::new(
            note_id,
            next_version(&self.store, &note_id.into()).await?,
            self.clock.now(),
            EventKind::NoteContentChanged { content },
        );
        self.store.append(event).await.map_err(CommandError::store)?;
        Ok(())
    }

    /// Delete a note.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the note is missing or already deleted.
    pub async fn delete_note(&self, note_id: &EntryId) -> CommandResult<()> {
        self.require_note(note_id).await?;
        let event = DomainEvent::new(
            note_id,
            next_version(&self.store, &note_id.into()).await?,
            self.clock.now(),
            EventKind::NoteDeleted,
        );
        self.store.append(event).await.map_err(CommandError::store)?;
        Ok(())
    }

    /// Place a note between two neighbouring entries of any kind.
    ///
    /// Returns `false` without appending when the note already sits in the
    /// requested slot.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the note or a neighbour is missing.
    pub async fn reorder_note(&self, request: ReorderEntryRequest) -> CommandResult<bool> {
        let note = self.require_note(&request.entry_id).await?;
        self.reorder(&request, &note.order, |order| EventKind::NoteReordered { order })
            .await
    }

    /// Migrate a note to another collection.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the note is missing, already migrated
    /// elsewhere, or the target collection is deleted.
    pub async fn migrate_note(
        &self,
        note_id: &EntryId,
        target_collection_id: Option<&CollectionId>,
    ) -> CommandResult<MigrateEntryOutcome> {
        let note = self.require_note(note_id).await?;
        self.migrate(
            note_id,
            note.migrated_to.as_ref(),
            note.migrated_to_collection_id.as_ref(),
            target_collection_id,
            |target, copy| EventKind::NoteMigrated {
                target_collection_id: target,
                migrated_to_id: copy,
            },
        )
        .await
    }

    /// Create a journal event, ordered after the last entry of any kind.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the content is invalid, the collection
    /// is deleted, or the append fails.
    pub async fn create_event(&self, request: CreateEventRequest) -> CommandResult<EntryId> {
        let CreateEventRequest {
            content,
            event_date,
            collection_id,
        } = request;
        let content = normalize_content(&content)?;
        ensure_target_live(&self.collections, collection_id.as_ref()).await?;

        let last = self.entries.last_entry_order().await?;
        let order = key_between(last.as_deref(), None)?;

        let event_id = EntryId::new();
        let event = DomainEvent::new(
            &event_id,
            1,
            self.clock.now(),
            EventKind::EventCreated {
                content,
                event_date,
                collection_id,
                order,
            },
        );
        self.store.append(event).await.map_err(CommandError::store)?;
        info!(%event_id, "created event");
        Ok(event_id)
    }

    /// Overwrite a journal event's content.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the event is missing or the content is
    /// invalid.
    pub async fn update_event_content(
        &self,
        event_id: &EntryId,
        content: &str,
    ) -> CommandResult<()> {
        let content = normalize_content(content)?;
        self.require_event(event_id).await?;

        let event = DomainEvent::new(
            event_id,
            next_version(&self.store, &event_id.into()).await?,
            self.clock.now(),
            EventKind::EventContentChanged { content },
        );
        self.store.append(event).await.map_err(CommandError::store)?;
        Ok(())
    }

    /// Delete a journal event.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the event is missing or already
    /// deleted.
    pub async fn delete_event(&self, event_id: &EntryId) -> CommandResult<()> {
        self.require_event(event_id).await?;
        let event = DomainEvent::new(
            event_id,
            next_version(&self.store, &event_id.into()).await?,
            self.clock.now(),
            EventKind::EventDeleted,
        );
        self.store.append(event).await.map_err(CommandError::store)?;
        Ok(())
    }

    /// Place a journal event between two neighbouring entries of any kind.
    ///
    /// Returns `false` without appending when the event already sits in the
    /// requested slot.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the event or a neighbour is missing.
    pub async fn reorder_event(&self, request: ReorderEntryRequest) -> CommandResult<bool> {
        let journal_event = self.require_event(&request.entry_id).await?;
        self.reorder(&request, &journal_event.order, |order| {
            EventKind::EventReordered { order }
        })
        .await
    }

    /// Migrate a journal event to another collection.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the event is missing, already migrated
    /// elsewhere, or the target collection is deleted.
    pub async fn migrate_event(
        &self,
        event_id: &EntryId,
        target_collection_id: Option<&CollectionId>,
    ) -> CommandResult<MigrateEntryOutcome> {
        let journal_event = self.require_event(event_id).await?;
        self.migrate(
            event_id,
            journal_event.migrated_to.as_ref(),
            journal_event.migrated_to_collection_id.as_ref(),
            target_collection_id,
            |target, copy| EventKind::EventMigrated {
                target_collection_id: target,
                migrated_to_id: copy,
            },
        )
        .await
    }

    /// Relocate any entry to `target_collection_id` (or out of all
    /// collections with `None`).
    ///
    /// Idempotent when the entry's current collection already equals the
    /// target. When the entry is a task with children, the parent and every
    /// child move in one atomic batch — children always follow their
    /// parent, even ones previously moved elsewhere.
    ///
    /// Returns the number of events appended (`0` for the idempotent case).
    ///
    /// # Errors
    /// Returns [`CommandError`] when the entry is missing or the target
    /// collection is deleted.
    pub async fn move_entry_to_collection(
        &self,
        entry_id: &EntryId,
        target_collection_id: Option<&CollectionId>,
    ) -> CommandResult<usize> {
        let entry = self
            .entries
            .entry_by_id(entry_id)
            .await?
            .filter(|entry| !entry.is_deleted())
            .ok_or_else(|| CommandError::not_found(format!("entry {entry_id} not found")))?;
        ensure_target_live(&self.collections, target_collection_id).await?;

        if entry.collection_id() == target_collection_id {
            return Ok(0);
        }

        let now = self.clock.now();
        let mut events = vec![DomainEvent::new(
            entry_id,
            next_version(&self.store, &entry_id.into()).await?,
            now,
            EventKind::EntryMovedToCollection {
                collection_id: target_collection_id.cloned(),
            },
        )];

        if matches!(entry, Entry::Task(_)) {
            for child in self.entries.sub_tasks(entry_id).await? {
                events.push(DomainEvent::new(
                    &child.id,
                    next_version(&self.store, &(&child.id).into()).await?,
                    now,
                    EventKind::EntryMovedToCollection {
                        collection_id: target_collection_id.cloned(),
                    },
                ));
            }
        }

        let appended = events.len();
        self.store
            .append_batch(events)
            .await
            .map_err(CommandError::store)?;
        debug!(%entry_id, appended, "moved entry");
        Ok(appended)
    }

    /// Borrow the projection this writer validates against.
    pub const fn entries(&self) -> &EntryProjection<S> {
        &self.entries
    }

    async fn reorder(
        &self,
        request: &ReorderEntryRequest,
        current_order: &str,
        make_kind: impl FnOnce(String) -> EventKind,
    ) -> CommandResult<bool> {
        let previous = match &request.previous_entry_id {
            Some(id) => Some(self.require_entry(id).await?.order().to_owned()),
            None => None,
        };
        let next = match &request.next_entry_id {
            Some(id) => Some(self.require_entry(id).await?.order().to_owned()),
            None => None,
        };

        let Some(order) = reorder_key(current_order, previous.as_deref(), next.as_deref())? else {
            return Ok(false);
        };

        let event = DomainEvent::new(
            &request.entry_id,
            next_version(&self.store, &(&request.entry_id).into()).await?,
            self.clock.now(),
            make_kind(order),
        );
        self.store.append(event).await.map_err(CommandError::store)?;
        Ok(true)
    }

    async fn migrate(
        &self,
        entry_id: &EntryId,
        migrated_to: Option<&EntryId>,
        migrated_to_collection_id: Option<&CollectionId>,
        target_collection_id: Option<&CollectionId>,
        make_kind: impl FnOnce(Option<CollectionId>, EntryId) -> EventKind,
    ) -> CommandResult<MigrateEntryOutcome> {
        ensure_target_live(&self.collections, target_collection_id).await?;

        if let Some(existing) = migrated_to {
            if migrated_to_collection_id == target_collection_id {
                return Ok(MigrateEntryOutcome {
                    migrated_to: existing.clone(),
                    changed: false,
                });
            }
            return Err(CommandError::illegal(format!(
                "entry {entry_id} was already migrated to a different collection"
            )));
        }

        let copy_id = EntryId::new();
        let event = DomainEvent::new(
            entry_id,
            next_version(&self.store, &entry_id.into()).await?,
            self.clock.now(),
            make_kind(target_collection_id.cloned(), copy_id.clone()),
        );
        self.store.append(event).await.map_err(CommandError::store)?;
        info!(%entry_id, migrated_to = %copy_id, "migrated entry");
        Ok(MigrateEntryOutcome {
            migrated_to: copy_id,
            changed: true,
        })
    }

    async fn require_note(&self, note_id: &EntryId) -> CommandResult<Note> {
        match self.require_entry(note_id).await? {
            Entry::Note(note) => Ok(note),
            other => Err(CommandError::validation(format!(
                "entry {note_id} is a {}, not a note",
                other.kind_name()
            ))),
        }
    }

    async fn require_event(&self, event_id: &EntryId) -> CommandResult<JournalEvent> {
        match self.require_entry(event_id).await? {
            Entry::Event(journal_event) => Ok(journal_event),
            other => Err(CommandError::validation(format!(
                "entry {event_id} is a {}, not an event",
                other.kind_name()
            ))),
        }
    }

    async fn require_entry(&self, entry_id: &EntryId) -> CommandResult<Entry> {
        self.entries
            .entry_by_id(entry_id)
            .await?
            .filter(|entry| !entry.is_deleted())
            .ok_or_else(|| CommandError::not_found(format!("entry {entry_id} not found")))
    }
}

/// Payload for creating a note.
#[derive(Debug, Clone)]
pub struct CreateNoteRequest {
    /// Raw content; trimmed and length-checked by the writer.
    pub content: String,
    /// Collection the note starts in, if any.
    pub collection_id: Option<CollectionId>,
}

/// Payload for creating a journal event.
#[derive(Debug, Clone)]
pub struct CreateEventRequest {
    /// Raw content; trimmed and length-checked by the writer.
    pub content: String,
    /// Day the event takes place, `YYYY-MM-DD`.
    pub event_date: Option<String>,
    /// Collection the event starts in, if any.
    pub collection_id: Option<CollectionId>,
}

/// Payload for reordering a note or event between two neighbouring entries.
#[derive(Debug, Clone)]
pub struct ReorderEntryRequest {
    /// Entry to reorder.
    pub entry_id: EntryId,
    /// Entry to land after, `None` for the start.
    pub previous_entry_id: Option<EntryId>,
    /// Entry to land before, `None` for the end.
    pub next_entry_id: Option<EntryId>,
}

/// Result of a note or event migration.
#[derive(Debug, Clone)]
pub struct MigrateEntryOutcome {
    /// Id of the active copy in the target collection.
    pub migrated_to: EntryId,
    /// Whether any event was appended (`false` for an idempotent repeat).
    pub changed: bool,
}
