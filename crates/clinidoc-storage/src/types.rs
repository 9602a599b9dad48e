//! Data types used by the storage traits.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

use crate::error::StorageError;

/// The kinds of entities the store persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Patient,
    Episode,
    Encounter,
    Condition,
    Finding,
    Report,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Patient,
        EntityKind::Episode,
        EntityKind::Encounter,
        EntityKind::Condition,
        EntityKind::Finding,
        EntityKind::Report,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Episode => "episode",
            Self::Encounter => "encounter",
            Self::Condition => "condition",
            Self::Finding => "finding",
            Self::Report => "report",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Self::Patient),
            "episode" => Ok(Self::Episode),
            "encounter" => Ok(Self::Encounter),
            "condition" => Ok(Self::Condition),
            "finding" => Ok(Self::Finding),
            "report" => Ok(Self::Report),
            _ => Err(StorageError::invalid_entity(format!(
                "unknown entity kind: {s}"
            ))),
        }
    }
}

/// An entity as stored in the backend: a versioned JSON body plus
/// bookkeeping timestamps. The version is the compare-and-swap token for
/// `replace`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntity {
    pub id: String,
    pub kind: EntityKind,
    pub version: u64,
    pub body: Value,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl StoredEntity {
    /// Creates a new `StoredEntity` at version 1.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: EntityKind, body: Value) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: id.into(),
            kind,
            version: 1,
            body,
            last_updated: now,
            created_at: now,
        }
    }

    /// Creates the successor version of this entity with a replaced body.
    #[must_use]
    pub fn next_version(&self, body: Value) -> Self {
        Self {
            id: self.id.clone(),
            kind: self.kind,
            version: self.version + 1,
            body,
            last_updated: OffsetDateTime::now_utc(),
            created_at: self.created_at,
        }
    }

    /// The `{kind}/{id}` storage key.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}/{}", self.kind, self.id)
    }
}
