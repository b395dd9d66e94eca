#![warn(missing_docs)]

//! Command handlers and projections for the Squickr Life journal core.
//!
//! Control flow is strictly one-directional: a command handler reads
//! current state from a projection, validates, and appends one or more
//! events atomically; projections re-fold the log whenever it changes and
//! notify their subscribers. Handlers never mutate state directly, so any
//! projection can be rebuilt from the log at any time.

/// Read model over collections.
pub mod collection_projection;
/// Collection command handlers.
pub mod collection_writer;
/// Read model over every entry, including ghost rendering.
pub mod entry_projection;
/// Note, event, and move command handlers.
pub mod entry_writer;
/// Command error taxonomy.
pub mod error;
/// Async storage contract.
pub mod event_store;
/// Façade bundling writers and projections.
pub mod journal;
mod support;
/// Task-only read model.
pub mod task_projection;
/// Task command handlers.
pub mod task_writer;

pub use collection_projection::CollectionProjection;
pub use collection_writer::{CollectionWriter, CreateCollectionOutcome, CreateCollectionRequest};
pub use entry_projection::{CollectionViewEntry, EntryProjection};
pub use entry_writer::{
    CreateEventRequest, CreateNoteRequest, EntryWriter, MigrateEntryOutcome, ReorderEntryRequest,
};
pub use error::{CommandError, CommandResult};
pub use event_store::EventStore;
pub use journal::Journal;
pub use task_projection::TaskProjection;
pub use task_writer::{
    CascadeOutcome, CreateSubTaskRequest, CreateTaskRequest, MigrateTaskOutcome,
    ReorderTaskRequest, TaskWriter,
};
