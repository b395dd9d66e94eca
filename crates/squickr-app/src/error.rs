use squickr_core::{CollectionDateError, OrderKeyError, TextError};
use thiserror::Error;

/// Errors surfaced by command writers.
///
/// Every variant except [`CommandError::Store`] is raised before anything is
/// appended, so a failed command never changes the log.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A field was out of range or malformed.
    #[error("validation failed: {0}")]
    Validation(String),
    /// A referenced aggregate is missing or soft-deleted.
    #[error("not found: {0}")]
    NotFound(String),
    /// The command is not legal in the aggregate's current state.
    #[error("illegal transition: {0}")]
    IllegalTransition(String),
    /// A cascade would touch children and the caller has not confirmed.
    #[error("confirmation required: {incomplete_children} child task(s) would be affected")]
    NeedsConfirmation {
        /// Number of children the cascade would touch.
        incomplete_children: usize,
    },
    /// The underlying store rejected the append.
    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),
}

impl CommandError {
    /// Build a validation error from any displayable message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Build a not-found error from any displayable message.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Build an illegal-transition error from any displayable message.
    pub fn illegal(message: impl Into<String>) -> Self {
        Self::IllegalTransition(message.into())
    }

    pub(crate) fn store<E: Into<anyhow::Error>>(err: E) -> Self {
        Self::Store(err.into())
    }
}

impl From<TextError> for CommandError {
    fn from(err: TextError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<CollectionDateError> for CommandError {
    fn from(err: CollectionDateError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<OrderKeyError> for CommandError {
    fn from(err: OrderKeyError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Shorthand result for command handlers.
pub type CommandResult<T> = Result<T, CommandError>;
