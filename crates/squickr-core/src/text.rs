//! Normalization and length rules for user-entered text fields.

use thiserror::Error;

/// Maximum characters for a task title or collection name after trimming.
pub const MAX_TITLE_LENGTH: usize = 500;
/// Maximum characters for note and event content after trimming.
pub const MAX_CONTENT_LENGTH: usize = 5000;

/// Errors produced while validating user-entered text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TextError {
    /// The field is empty after trimming.
    #[error("{field} must not be empty")]
    Empty {
        /// Name of the offending field.
        field: &'static str,
    },
    /// The field exceeds its maximum length after trimming.
    #[error("{field} must be at most {max} characters (got {actual})")]
    TooLong {
        /// Name of the offending field.
        field: &'static str,
        /// Maximum allowed length.
        max: usize,
        /// Actual length of the trimmed value.
        actual: usize,
    },
}

fn normalize(raw: &str, field: &'static str, max: usize) -> Result<String, TextError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TextError::Empty { field });
    }
    let actual = trimmed.chars().count();
    if actual > max {
        return Err(TextError::TooLong { field, max, actual });
    }
    Ok(trimmed.to_owned())
}

/// Trim and validate a task title (1–500 characters).
///
/// # Errors
/// Returns [`TextError`] when the trimmed title is empty or too long.
pub fn normalize_title(raw: &str) -> Result<String, TextError> {
    normalize(raw, "title", MAX_TITLE_LENGTH)
}

/// Trim and validate a collection name (1–500 characters).
///
/// # Errors
/// Returns [`TextError`] when the trimmed name is empty or too long.
pub fn normalize_name(raw: &str) -> Result<String, TextError> {
    normalize(raw, "name", MAX_TITLE_LENGTH)
}

/// Trim and validate note or event content (1–5000 characters).
///
/// # Errors
/// Returns [`TextError`] when the trimmed content is empty or too long.
pub fn normalize_content(raw: &str) -> Result<String, TextError> {
    normalize(raw, "content", MAX_CONTENT_LENGTH)
}

/// Canonical form used when comparing collection names for duplicate
/// detection: trimmed and lowercased.
#[must_use]
pub fn dedupe_key(name: &str) -> String {
    name.trim().to_lowercase()
}
