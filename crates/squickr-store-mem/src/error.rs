use squickr_core::{AggregateId, EventId};
use thiserror::Error;
use time::OffsetDateTime;

/// Errors surfaced by the in-memory event store.
///
/// Every error leaves the log untouched: a failed append (single or batch)
/// is never partially visible.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An atomic append was requested with no events.
    #[error("batch must contain at least one event")]
    EmptyBatch,
    /// The event envelope has no aggregate id.
    #[error("event {event_id} has an empty aggregate id")]
    MissingAggregateId {
        /// Offending event.
        event_id: EventId,
    },
    /// The event version does not continue the aggregate's stream.
    #[error("aggregate {aggregate_id}: expected version {expected}, got {found}")]
    VersionConflict {
        /// Aggregate whose stream was violated.
        aggregate_id: AggregateId,
        /// Version the stream requires next.
        expected: u64,
        /// Version the event carried.
        found: u64,
    },
    /// The event timestamp lies beyond the allowed clock skew.
    #[error("event {event_id} is timestamped in the future ({timestamp})")]
    TimestampInFuture {
        /// Offending event.
        event_id: EventId,
        /// Rejected timestamp.
        timestamp: OffsetDateTime,
    },
}
