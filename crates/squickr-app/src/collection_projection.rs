//! Read model over collections.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use squickr_core::{Collection, CollectionId, CollectionType, DomainEvent, EventKind};
use squickr_store_mem::{CallbackRegistry, ChangeCallback, Subscription};
use tokio::sync::{Mutex, MutexGuard};

use crate::error::{CommandError, CommandResult};
use crate::event_store::EventStore;

/// Cached read model over every collection in the log.
///
/// Materialized values have their legacy `collapseCompleted` flag folded
/// into `completed_task_behavior`; the log keeps the flag as written.
pub struct CollectionProjection<S: EventStore> {
    store: S,
    cache: Mutex<CollectionCache>,
    dirty: Arc<AtomicBool>,
    subscribers: CallbackRegistry,
    _store_subscription: S::Subscription,
}

impl<S: EventStore> CollectionProjection<S> {
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
            cache: Mutex::new(CollectionCache::default()),
            dirty,
            subscribers,
            _store_subscription: subscription,
        }
    }

    /// Register a change listener re-notified on every store change.
    pub fn subscribe(&self, callback: ChangeCallback) -> Subscription {
        self.subscribers.register(callback)
    }

    /// Collections that are not soft-deleted, ordered by their order key.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn collections(&self) -> CommandResult<Vec<Collection>> {
        let cache = self.fresh_cache().await?;
        let mut collections: Vec<Collection> = cache
            .collections
            .values()
            .filter(|collection| !collection.is_deleted())
            .map(materialize)
            .collect();
        collections.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        Ok(collections)
    }

    /// Soft-deleted collections, most recently deleted first.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn deleted_collections(&self) -> CommandResult<Vec<Collection>> {
        let cache = self.fresh_cache().await?;
        let mut collections: Vec<Collection> = cache
            .collections
            .values()
            .filter(|collection| collection.is_deleted())
            .map(materialize)
            .collect();
        collections.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at).then_with(|| a.id.cmp(&b.id)));
        Ok(collections)
    }

    /// Look up a live collection.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn collection_by_id(
        &self,
        collection_id: &CollectionId,
    ) -> CommandResult<Option<Collection>> {
        let cache = self.fresh_cache().await?;
        Ok(cache
            .collections
            .get(collection_id)
            .filter(|collection| !collection.is_deleted())
            .map(materialize))
    }

    /// Look up a collection whether or not it was soft-deleted.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn collection_by_id_including_deleted(
        &self,
        collection_id: &CollectionId,
    ) -> CommandResult<Option<Collection>> {
        let cache = self.fresh_cache().await?;
        Ok(cache.collections.get(collection_id).map(materialize))
    }

    /// The live daily log for a `YYYY-MM-DD` date, if one exists.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn daily_log_by_date(&self, date: &str) -> CommandResult<Option<Collection>> {
        self.log_by_type_and_date(CollectionType::Daily, date).await
    }

    /// The live monthly log for a `YYYY-MM` date, if one exists.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn monthly_log_by_date(&self, date: &str) -> CommandResult<Option<Collection>> {
        self.log_by_type_and_date(CollectionType::Monthly, date)
            .await
    }

    /// The live collection for a (dated type, date) natural key.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn log_by_type_and_date(
        &self,
        collection_type: CollectionType,
        date: &str,
    ) -> CommandResult<Option<Collection>> {
        let cache = self.fresh_cache().await?;
        Ok(cache
            .collections
            .values()
            .find(|collection| {
                !collection.is_deleted()
                    && collection.collection_type == collection_type
                    && collection.date.as_deref() == Some(date)
            })
            .map(materialize))
    }

    /// Live collections created by `user_id` whose normalized name matches
    /// `name_key`, used for duplicate-create detection.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub(crate) async fn live_by_name_key(
        &self,
        name_key: &str,
        user_id: Option<&str>,
    ) -> CommandResult<Vec<Collection>> {
        let cache = self.fresh_cache().await?;
        Ok(cache
            .collections
            .values()
            .filter(|collection| {
                !collection.is_deleted()
                    && squickr_core::text::dedupe_key(&collection.name) == name_key
                    && collection.user_id.as_deref() == user_id
            })
            .map(materialize)
            .collect())
    }

    /// Largest order key across every collection, used to append new
    /// collections at the end.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub(crate) async fn last_collection_order(&self) -> CommandResult<Option<String>> {
        let cache = self.fresh_cache().await?;
        Ok(cache
            .collections
            .values()
            .map(|collection| collection.order.clone())
            .max())
    }

    async fn fresh_cache(&self) -> CommandResult<MutexGuard<'_, CollectionCache>> {
        let mut guard = self.cache.lock().await;
        if self.dirty.swap(false, Ordering::AcqRel) {
            let events = self.store.get_all().await.map_err(CommandError::store)?;
            *guard = CollectionCache::fold(&events);
        }
        Ok(guard)
    }
}

/// Clone a cached collection with legacy settings folded in.
fn materialize(collection: &Collection) -> Collection {
    let mut collection = collection.clone();
    collection.settings = collection.settings.migrate_legacy();
    collection
}

#[derive(Default)]
struct CollectionCache {
    collections: HashMap<CollectionId, Collection>,
}

impl CollectionCache {
    fn fold(events: &[DomainEvent]) -> Self {
        let mut cache = Self::default();
        for event in events {
            cache.apply(event);
        }
        cache
    }

    fn apply(&mut self, event: &DomainEvent) {
        if !event.kind.is_collection_event() {
            return;
        }
        let collection_id = CollectionId::from(&event.aggregate_id);
        if let EventKind::CollectionCreated {
            name,
            collection_type,
            date,
            order,
            user_id,
        } = &event.kind
        {
            self.collections.insert(
                collection_id.clone(),
                Collection::from_created(
                    collection_id,
                    event.timestamp,
                    name.clone(),
                    *collection_type,
                    date.clone(),
                    order.clone(),
                    user_id.clone(),
                ),
            );
        } else if let Some(collection) = self.collections.get_mut(&collection_id) {
            collection.apply(event);
        }
    }
}
