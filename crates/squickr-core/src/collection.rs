use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::event::{DomainEvent, EventKind};
use crate::id::CollectionId;

/// Kinds of collections a journal can hold.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionType {
    /// One page per day (`YYYY-MM-DD`).
    Daily,
    /// One page per month (`YYYY-MM`).
    Monthly,
    /// One page per year (`YYYY`).
    Yearly,
    /// Free-form user collection.
    Custom,
    /// Generic running log; the default for new collections.
    #[default]
    Log,
    /// Habit/metric tracker.
    Tracker,
}

impl CollectionType {
    /// String representation used in payloads and messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Custom => "custom",
            Self::Log => "log",
            Self::Tracker => "tracker",
        }
    }

    /// Whether collections of this type are keyed by their date.
    #[must_use]
    pub const fn is_dated(self) -> bool {
        matches!(self, Self::Daily | Self::Monthly | Self::Yearly)
    }

    /// Validate the `date` field against this type's format rules.
    ///
    /// Daily collections require `YYYY-MM-DD`, monthly `YYYY-MM`, yearly
    /// `YYYY`; all other types forbid a date.
    ///
    /// # Errors
    /// Returns [`CollectionDateError`] on a missing, forbidden, or malformed
    /// date.
    pub fn validate_date(self, date: Option<&str>) -> Result<(), CollectionDateError> {
        match (self, date) {
            (Self::Daily | Self::Monthly | Self::Yearly, None) => {
                Err(CollectionDateError::Missing {
                    collection_type: self,
                })
            }
            (Self::Daily, Some(date)) => check_format(self, date, "YYYY-MM-DD", is_full_date),
            (Self::Monthly, Some(date)) => check_format(self, date, "YYYY-MM", is_year_month),
            (Self::Yearly, Some(date)) => check_format(self, date, "YYYY", is_year),
            (Self::Custom | Self::Log | Self::Tracker, Some(_)) => {
                Err(CollectionDateError::Forbidden {
                    collection_type: self,
                })
            }
            (Self::Custom | Self::Log | Self::Tracker, None) => Ok(()),
        }
    }
}

impl std::fmt::Display for CollectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn check_format(
    collection_type: CollectionType,
    date: &str,
    expected: &'static str,
    check: fn(&str) -> bool,
) -> Result<(), CollectionDateError> {
    if check(date) {
        Ok(())
    } else {
        Err(CollectionDateError::Format {
            collection_type,
            expected,
            date: date.to_owned(),
        })
    }
}

fn is_full_date(date: &str) -> bool {
    let format = format_description!("[year]-[month]-[day]");
    date.len() == 10 && time::Date::parse(date, &format).is_ok()
}

fn is_year_month(date: &str) -> bool {
    let bytes = date.as_bytes();
    if bytes.len() != 7 || bytes[4] != b'-' {
        return false;
    }
    let digits = bytes[..4].iter().chain(&bytes[5..]).all(u8::is_ascii_digit);
    digits && matches!(date[5..].parse::<u8>(), Ok(1..=12))
}

fn is_year(date: &str) -> bool {
    date.len() == 4 && date.bytes().all(|b| b.is_ascii_digit())
}

/// Errors produced while validating a collection's date field.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CollectionDateError {
    /// A dated collection type was given no date.
    #[error("{collection_type} collections require a date")]
    Missing {
        /// Offending collection type.
        collection_type: CollectionType,
    },
    /// An undated collection type was given a date.
    #[error("{collection_type} collections do not take a date")]
    Forbidden {
        /// Offending collection type.
        collection_type: CollectionType,
    },
    /// The date does not match the type's format.
    #[error("{collection_type} collections use {expected} dates, got `{date}`")]
    Format {
        /// Offending collection type.
        collection_type: CollectionType,
        /// Expected format.
        expected: &'static str,
        /// Rejected value.
        date: String,
    },
}

/// How a collection displays completed tasks.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompletedTaskBehavior {
    /// Leave completed tasks where they are.
    #[default]
    KeepInPlace,
    /// Collapse completed tasks into a folded section.
    Collapse,
    /// Hide completed tasks entirely.
    Hide,
}

/// The explicit completed-task behavior slot of [`CollectionSettings`].
///
/// The wire format needs three states here: a key that was never written
/// (the legacy flag, if any, still decides), a key explicitly set to
/// `null` (clear any override and defer to the global default, ignoring
/// the legacy flag), and an explicit behavior (always wins).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum BehaviorOverride {
    /// The field was never written.
    #[default]
    Unset,
    /// The field was explicitly nulled; use the global default.
    UseDefault,
    /// An explicit behavior.
    Explicit(CompletedTaskBehavior),
}

impl BehaviorOverride {
    /// Whether the field was never written (serialization omits it).
    #[must_use]
    pub const fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }
}

impl Serialize for BehaviorOverride {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Unset | Self::UseDefault => serializer.serialize_none(),
            Self::Explicit(behavior) => behavior.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for BehaviorOverride {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // A present key deserializes here; `null` becomes `UseDefault`.
        // `Unset` only arises through `#[serde(default)]` on an absent key.
        Ok(match Option::<CompletedTaskBehavior>::deserialize(deserializer)? {
            Some(behavior) => Self::Explicit(behavior),
            None => Self::UseDefault,
        })
    }
}

/// Per-collection display settings.
///
/// The legacy `collapseCompleted` flag is preserved exactly as written to
/// the log; it is only translated when materializing a [`Collection`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSettings {
    /// Explicit behavior slot; see [`BehaviorOverride`] for the three-way
    /// precedence against the legacy flag.
    #[serde(default, skip_serializing_if = "BehaviorOverride::is_unset")]
    pub completed_task_behavior: BehaviorOverride,
    /// Legacy boolean predecessor of `completed_task_behavior`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapse_completed: Option<bool>,
}

impl CollectionSettings {
    /// Behavior after applying the precedence rules.
    ///
    /// An explicit value always wins. An explicitly nulled field clears any
    /// override and returns `None` (use the global default), ignoring the
    /// legacy flag. Only a field that was never written falls back to the
    /// legacy flag; with neither present the result is also `None`.
    #[must_use]
    pub fn resolved(&self) -> Option<CompletedTaskBehavior> {
        match self.completed_task_behavior {
            BehaviorOverride::Explicit(behavior) => Some(behavior),
            BehaviorOverride::UseDefault => None,
            BehaviorOverride::Unset => self.collapse_completed.map(|collapse| {
                if collapse {
                    CompletedTaskBehavior::Collapse
                } else {
                    CompletedTaskBehavior::KeepInPlace
                }
            }),
        }
    }

    /// Settings with the legacy flag folded into the explicit field, as
    /// returned by projections. An explicitly nulled field stays nulled.
    #[must_use]
    pub fn migrate_legacy(&self) -> Self {
        let completed_task_behavior = match (self.completed_task_behavior, self.collapse_completed)
        {
            (BehaviorOverride::Unset, Some(collapse)) => {
                BehaviorOverride::Explicit(if collapse {
                    CompletedTaskBehavior::Collapse
                } else {
                    CompletedTaskBehavior::KeepInPlace
                })
            }
            (behavior, _) => behavior,
        };
        Self {
            completed_task_behavior,
            collapse_completed: None,
        }
    }

    /// Whether two settings values are observably the same: unset and legacy
    /// `false` both count as [`CompletedTaskBehavior::KeepInPlace`].
    #[must_use]
    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.resolved().unwrap_or_default() == other.resolved().unwrap_or_default()
    }
}

/// Record of an entry's residency in one collection.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionHistoryEntry {
    /// Collection the entry lived in.
    pub collection_id: CollectionId,
    /// When the entry arrived.
    #[serde(with = "time::serde::rfc3339")]
    pub added_at: OffsetDateTime,
    /// When the entry left; `None` means currently resident.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub removed_at: Option<OffsetDateTime>,
}

/// Materialized collection state, derived by replaying its events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    /// Identifier (also the aggregate id).
    pub id: CollectionId,
    /// Display name.
    pub name: String,
    /// Kind of collection.
    pub collection_type: CollectionType,
    /// Fractional-index order key.
    pub order: String,
    /// Date key, format tied to the type.
    pub date: Option<String>,
    /// Whether the user pinned the collection.
    pub is_favorite: bool,
    /// Last time the collection was opened.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_accessed_at: Option<OffsetDateTime>,
    /// Creation instant.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Soft-deletion instant, if any.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
    /// Display settings as written to the log.
    pub settings: CollectionSettings,
    /// User who created the collection.
    pub user_id: Option<String>,
}

impl Collection {
    /// Build the initial state from a `CollectionCreated` event's fields.
    #[must_use]
    pub fn from_created(
        id: CollectionId,
        created_at: OffsetDateTime,
        name: String,
        collection_type: CollectionType,
        date: Option<String>,
        order: String,
        user_id: Option<String>,
    ) -> Self {
        Self {
            id,
            name,
            collection_type,
            order,
            date,
            is_favorite: false,
            last_accessed_at: None,
            created_at,
            deleted_at: None,
            settings: CollectionSettings::default(),
            user_id,
        }
    }

    /// Apply one event to this collection. Events for other aggregates or
    /// unrelated kinds are ignored.
    pub fn apply(&mut self, event: &DomainEvent) {
        match &event.kind {
            EventKind::CollectionRenamed { name } => {
                self.name.clone_from(name);
            }
            EventKind::CollectionReordered { order } => {
                self.order.clone_from(order);
            }
            EventKind::CollectionDeleted => {
                self.deleted_at = Some(event.timestamp);
            }
            EventKind::CollectionRestored => {
                self.deleted_at = None;
            }
            EventKind::CollectionSettingsUpdated { settings } => {
                self.settings = settings.clone();
            }
            EventKind::CollectionFavorited => {
                self.is_favorite = true;
            }
            EventKind::CollectionUnfavorited => {
                self.is_favorite = false;
            }
            EventKind::CollectionAccessed { accessed_at } => {
                self.last_accessed_at = Some(*accessed_at);
            }
            _ => {}
        }
    }

    /// Whether the collection is currently soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
