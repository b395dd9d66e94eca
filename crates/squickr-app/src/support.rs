//! Small helpers shared by the command writers.

use squickr_core::{AggregateId, CollectionId, key_between};

use crate::collection_projection::CollectionProjection;
use crate::error::{CommandError, CommandResult};
use crate::event_store::EventStore;

/// Next version in an aggregate's stream (the store enforces continuity).
pub(crate) async fn next_version<S: EventStore>(
    store: &S,
    aggregate_id: &AggregateId,
) -> CommandResult<u64> {
    let events = store
        .get_by_aggregate(aggregate_id)
        .await
        .map_err(CommandError::store)?;
    Ok(version_after(events.len()))
}

pub(crate) fn version_after(count: usize) -> u64 {
    u64::try_from(count).map_or(u64::MAX, |count| count.saturating_add(1))
}

/// Check a collection a command wants to place entries into.
///
/// Unknown ids are tolerated (they may reference a collection written by
/// another device's log), but a soft-deleted collection rejects.
pub(crate) async fn ensure_target_live<S: EventStore>(
    collections: &CollectionProjection<S>,
    target: Option<&CollectionId>,
) -> CommandResult<()> {
    if let Some(collection_id) = target {
        let deleted = collections
            .collection_by_id_including_deleted(collection_id)
            .await?
            .is_some_and(|collection| collection.is_deleted());
        if deleted {
            return Err(CommandError::not_found(format!(
                "collection {collection_id} is deleted"
            )));
        }
    }
    Ok(())
}

/// Resolve a reorder request into a new order key.
///
/// Returns `None` when the current key already lies in the requested slot,
/// which makes the reorder a no-op.
pub(crate) fn reorder_key(
    current: &str,
    previous: Option<&str>,
    next: Option<&str>,
) -> CommandResult<Option<String>> {
    let after_previous = previous.is_none_or(|previous| previous < current);
    let before_next = next.is_none_or(|next| current < next);
    if after_previous && before_next {
        return Ok(None);
    }
    Ok(Some(key_between(previous, next)?))
}
