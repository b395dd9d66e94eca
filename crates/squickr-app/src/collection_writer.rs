//! Collection command handlers.

use squickr_core::clock::SharedClock;
use squickr_core::text::{dedupe_key, normalize_name};
use squickr_core::{
    Collection, CollectionId, CollectionSettings, CollectionType, DomainEvent, EventKind,
    key_between,
};
use time::Duration;
use tracing::info;

use crate::collection_projection::CollectionProjection;
use crate::error::{CommandError, CommandResult};
use crate::event_store::EventStore;
use crate::support::{next_version, reorder_key};

/// Window inside which a create with an identical normalized name and user
/// is treated as an accidental double-submit and returns the existing id.
const DUPLICATE_NAME_WINDOW: Duration = Duration::seconds(5);

/// Validates collection commands and emits collection events.
pub struct CollectionWriter<S: EventStore + Clone> {
    store: S,
    collections: CollectionProjection<S>,
    clock: SharedClock,
}

impl<S: EventStore + Clone> CollectionWriter<S> {
    /// Construct a writer over `store`, stamping events with `clock`.
    pub fn new(store: S, clock: SharedClock) -> Self {
        Self {
            collections: CollectionProjection::new(store.clone()),
            store,
            clock,
        }
    }

    /// Create a collection, ordered after the current last collection.
    ///
    /// Dated types (daily, monthly, yearly) are keyed naturally: creating a
    /// second collection for an existing (type, date) returns the existing
    /// id and appends nothing, regardless of the name. Undated duplicates
    /// are only folded together when an identical normalized name from the
    /// same user arrives within a five-second window, which protects
    /// against double-clicks without forbidding same-named collections.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the name or date is invalid or the
    /// append fails.
    pub async fn create_collection(
        &self,
        request: CreateCollectionRequest,
    ) -> CommandResult<CreateCollectionOutcome> {
        let CreateCollectionRequest {
            name,
            collection_type,
            date,
            user_id,
        } = request;
        let name = normalize_name(&name)?;
        let collection_type = collection_type.unwrap_or_default();
        collection_type.validate_date(date.as_deref())?;

        if let Some(date) = date.as_deref() {
            if collection_type.is_dated() {
                if let Some(existing) = self
                    .collections
                    .log_by_type_and_date(collection_type, date)
                    .await?
                {
                    return Ok(CreateCollectionOutcome {
                        collection_id: existing.id,
                        created: false,
                    });
                }
            }
        }

        let now = self.clock.now();
        let name_key = dedupe_key(&name);
        let recent = self
            .collections
            .live_by_name_key(&name_key, user_id.as_deref())
            .await?
            .into_iter()
            .find(|collection| (now - collection.created_at).abs() <= DUPLICATE_NAME_WINDOW);
        if let Some(existing) = recent {
            return Ok(CreateCollectionOutcome {
                collection_id: existing.id,
                created: false,
            });
        }

        let last = self.collections.last_collection_order().await?;
        let order = key_between(last.as_deref(), None)?;

        let collection_id = CollectionId::new();
        let event = DomainEvent::new(
            &collection_id,
            1,
            now,
            EventKind::CollectionCreated {
                name,
                collection_type,
                date,
                order,
                user_id,
            },
        );
        self.store.append(event).await.map_err(CommandError::store)?;
        info!(%collection_id, %collection_type, "created collection");
        Ok(CreateCollectionOutcome {
            collection_id,
            created: true,
        })
    }

    /// Rename a collection.
    ///
    /// Returns `false` without appending when the name already matches.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the collection is missing or deleted,
    /// or the name is invalid.
    pub async fn rename_collection(
        &self,
        collection_id: &CollectionId,
        name: &str,
    ) -> CommandResult<bool> {
        let name = normalize_name(name)?;
        let collection = self.require_live(collection_id).await?;
        if collection.name == name {
            return Ok(false);
        }

        let event = DomainEvent::new(
            collection_id,
            next_version(&self.store, &collection_id.into()).await?,
            self.clock.now(),
            EventKind::CollectionRenamed { name },
        );
        self.store.append(event).await.map_err(CommandError::store)?;
        Ok(true)
    }

    /// Place a collection between two neighbouring collections.
    ///
    /// Returns `false` without appending when the collection already sits in
    /// the requested slot.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the collection or a neighbour is
    /// missing or deleted.
    pub async fn reorder_collection(
        &self,
        request: ReorderCollectionRequest,
    ) -> CommandResult<bool> {
        let ReorderCollectionRequest {
            collection_id,
            previous_collection_id,
            next_collection_id,
        } = request;
        let collection = self.require_live(&collection_id).await?;

        let previous = match &previous_collection_id {
            Some(id) => Some(self.require_live(id).await?.order),
            None => None,
        };
        let next = match &next_collection_id {
            Some(id) => Some(self.require_live(id).await?.order),
            None => None,
        };

        let Some(order) = reorder_key(&collection.order, previous.as_deref(), next.as_deref())?
        else {
            return Ok(false);
        };

        let event = DomainEvent::new(
            &collection_id,
            next_version(&self.store, &(&collection_id).into()).await?,
            self.clock.now(),
            EventKind::CollectionReordered { order },
        );
        self.store.append(event).await.map_err(CommandError::store)?;
        Ok(true)
    }

    /// Soft-delete a collection. Mutating commands fail until it is
    /// restored.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the collection is missing or already
    /// deleted.
    pub async fn delete_collection(&self, collection_id: &CollectionId) -> CommandResult<()> {
        self.require_live(collection_id).await?;
        let event = DomainEvent::new(
            collection_id,
            next_version(&self.store, &collection_id.into()).await?,
            self.clock.now(),
            EventKind::CollectionDeleted,
        );
        self.store.append(event).await.map_err(CommandError::store)?;
        info!(%collection_id, "deleted collection");
        Ok(())
    }

    /// Bring a soft-deleted collection back.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the collection is missing or not
    /// deleted.
    pub async fn restore_collection(&self, collection_id: &CollectionId) -> CommandResult<()> {
        let collection = self
            .collections
            .collection_by_id_including_deleted(collection_id)
            .await?
            .ok_or_else(|| {
                CommandError::not_found(format!("collection {collection_id} not found"))
            })?;
        if !collection.is_deleted() {
            return Err(CommandError::illegal(format!(
                "collection {collection_id} is not deleted"
            )));
        }

        let event = DomainEvent::new(
            collection_id,
            next_version(&self.store, &collection_id.into()).await?,
            self.clock.now(),
            EventKind::CollectionRestored,
        );
        self.store.append(event).await.map_err(CommandError::store)?;
        info!(%collection_id, "restored collection");
        Ok(())
    }

    /// Overwrite a collection's settings.
    ///
    /// Returns `false` without appending when the new settings are
    /// observably identical; an unset behavior and the legacy
    /// `collapseCompleted: false` both count as keep-in-place.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the collection is missing or deleted.
    pub async fn update_collection_settings(
        &self,
        collection_id: &CollectionId,
        settings: CollectionSettings,
    ) -> CommandResult<bool> {
        let collection = self.require_live(collection_id).await?;
        if collection.settings.is_equivalent(&settings) {
            return Ok(false);
        }

        let event = DomainEvent::new(
            collection_id,
            next_version(&self.store, &collection_id.into()).await?,
            self.clock.now(),
            EventKind::CollectionSettingsUpdated { settings },
        );
        self.store.append(event).await.map_err(CommandError::store)?;
        Ok(true)
    }

    /// Mark a collection as a favorite.
    ///
    /// Returns `false` without appending when it already is one.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the collection is missing or deleted.
    pub async fn favorite_collection(&self, collection_id: &CollectionId) -> CommandResult<bool> {
        let collection = self.require_live(collection_id).await?;
        if collection.is_favorite {
            return Ok(false);
        }

        let event = DomainEvent::new(
            collection_id,
            next_version(&self.store, &collection_id.into()).await?,
            self.clock.now(),
            EventKind::CollectionFavorited,
        );
        self.store.append(event).await.map_err(CommandError::store)?;
        Ok(true)
    }

    /// Remove a collection's favorite mark.
    ///
    /// Returns `false` without appending when it is not a favorite.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the collection is missing or deleted.
    pub async fn unfavorite_collection(&self, collection_id: &CollectionId) -> CommandResult<bool> {
        let collection = self.require_live(collection_id).await?;
        if !collection.is_favorite {
            return Ok(false);
        }

        let event = DomainEvent::new(
            collection_id,
            next_version(&self.store, &collection_id.into()).await?,
            self.clock.now(),
            EventKind::CollectionUnfavorited,
        );
        self.store.append(event).await.map_err(CommandError::store)?;
        Ok(true)
    }

    /// Record that the user opened a collection. Always appends.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the collection is missing or deleted.
    pub async fn access_collection(&self, collection_id: &CollectionId) -> CommandResult<()> {
        self.require_live(collection_id).await?;

        let now = self.clock.now();
        let event = DomainEvent::new(
            collection_id,
            next_version(&self.store, &collection_id.into()).await?,
            now,
            EventKind::CollectionAccessed { accessed_at: now },
        );
        self.store.append(event).await.map_err(CommandError::store)?;
        Ok(())
    }

    /// Borrow the projection this writer validates against.
    pub const fn collections(&self) -> &CollectionProjection<S> {
        &self.collections
    }

    async fn require_live(&self, collection_id: &CollectionId) -> CommandResult<Collection> {
        self.collections
            .collection_by_id(collection_id)
            .await?
            .ok_or_else(|| CommandError::not_found(format!("collection {collection_id} not found")))
    }
}

/// Payload for creating a collection.
#[derive(Debug, Clone)]
pub struct CreateCollectionRequest {
    /// Raw display name; trimmed and length-checked by the writer.
    pub name: String,
    /// Kind of collection; defaults to [`CollectionType::Log`].
    pub collection_type: Option<CollectionType>,
    /// Date key, required for dated types and forbidden otherwise.
    pub date: Option<String>,
    /// User issuing the command.
    pub user_id: Option<String>,
}

/// Payload for reordering a collection relative to its neighbours.
#[derive(Debug, Clone)]
pub struct ReorderCollectionRequest {
    /// Collection being moved.
    pub collection_id: CollectionId,
    /// Collection that should precede it, if any.
    pub previous_collection_id: Option<CollectionId>,
    /// Collection that should follow it, if any.
    pub next_collection_id: Option<CollectionId>,
}

/// Result of a create-collection command.
#[derive(Debug, Clone)]
pub struct CreateCollectionOutcome {
    /// Id of the created or already-existing collection.
    pub collection_id: CollectionId,
    /// Whether a new collection was actually created.
    pub created: bool,
}
