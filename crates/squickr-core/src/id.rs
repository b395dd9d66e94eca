use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a journal entry: a task, note, or event (UUID v4).
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an identifier that originated elsewhere (another device's log).
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// String form of the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of a collection (UUID v4).
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(String);

impl CollectionId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an identifier that originated elsewhere.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// String form of the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of a single log record (UUID v4).
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// String form of the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Untyped aggregate identifier carried by the event envelope.
///
/// Entry and collection events share one log, so the envelope field admits
/// both id families; [`From`] conversions keep call sites typed.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(String);

impl AggregateId {
    /// Wrap an identifier that originated elsewhere.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// String form of the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AggregateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<EntryId> for AggregateId {
    fn from(id: EntryId) -> Self {
        Self(id.0)
    }
}

impl From<&EntryId> for AggregateId {
    fn from(id: &EntryId) -> Self {
        Self(id.0.clone())
    }
}

impl From<CollectionId> for AggregateId {
    fn from(id: CollectionId) -> Self {
        Self(id.0)
    }
}

impl From<&CollectionId> for AggregateId {
    fn from(id: &CollectionId) -> Self {
        Self(id.0.clone())
    }
}

impl From<AggregateId> for EntryId {
    fn from(id: AggregateId) -> Self {
        Self(id.0)
    }
}

impl From<&AggregateId> for EntryId {
    fn from(id: &AggregateId) -> Self {
        Self(id.0.clone())
    }
}

impl From<AggregateId> for CollectionId {
    fn from(id: AggregateId) -> Self {
        Self(id.0)
    }
}

impl From<&AggregateId> for CollectionId {
    fn from(id: &AggregateId) -> Self {
        Self(id.0.clone())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use uuid::Uuid;

    #[test]
    fn fresh_ids_are_distinct_v4_uuids() {
        let a = EntryId::new();
        let b = EntryId::new();
        assert_ne!(a, b);

        let parsed = Uuid::parse_str(a.as_str()).expect("entry id must be a uuid");
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn aggregate_conversion_round_trips() {
        let entry = EntryId::new();
        let aggregate = AggregateId::from(&entry);
        assert_eq!(aggregate.as_str(), entry.as_str());
        assert_eq!(EntryId::from(&aggregate), entry);
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = CollectionId::from_string("monthly-log");
        let json = serde_json::to_string(&id).expect("serialize id");
        assert_eq!(json, "\"monthly-log\"");
    }
}
