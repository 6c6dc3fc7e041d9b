use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::oid::Oid;

/// Lifecycle state of an object's metadata record.
///
/// Transitions only move forward: `Pending` -> `Committed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectState {
    /// Claimed by an in-flight upload; not visible to readers.
    Pending,
    /// Durably available for download.
    Committed,
}

impl ObjectState {
    pub fn is_committed(self) -> bool {
        matches!(self, Self::Committed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Committed => "committed",
        }
    }
}

impl fmt::Display for ObjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectState {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "committed" => Ok(Self::Committed),
            other => Err(TypeError::UnknownState(other.to_string())),
        }
    }
}

/// Metadata for one content-addressed object as tracked by the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub oid: Oid,
    /// Declared byte length. Immutable once committed.
    pub size: i64,
    pub state: ObjectState,
    /// Projects referencing this object. Append-only outside of
    /// administrative removal.
    #[serde(default)]
    pub projects: BTreeSet<String>,
    /// Whether the call that produced this value found a previously stored
    /// record. Never persisted.
    #[serde(skip)]
    pub existing: bool,
}

impl ObjectRecord {
    /// A fresh pending record, optionally referenced by `project`.
    pub fn pending(oid: Oid, size: i64, project: &str) -> Self {
        let mut projects = BTreeSet::new();
        if !project.is_empty() {
            projects.insert(project.to_string());
        }
        Self {
            oid,
            size,
            state: ObjectState::Pending,
            projects,
            existing: false,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.state.is_committed()
    }

    /// Same record flagged as previously existing.
    pub fn into_existing(mut self) -> Self {
        self.existing = true;
        self
    }
}

/// A named collection of objects, analogous to a repository.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub name: String,
    #[serde(default)]
    pub oids: BTreeSet<Oid>,
}

impl ProjectRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            oids: BTreeSet::new(),
        }
    }

    pub fn contains(&self, oid: &Oid) -> bool {
        self.oids.contains(oid)
    }
}

/// Locally stored credential. The hash is never the raw password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String,
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
