//! Identity and bookkeeping shared by every stored object.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// The kinds of entity the arena persists.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, strum::Display,
)]
pub enum Kind {
    Creature,
    Battle,
}

impl Kind {
    /// Lower-case plural used for collection names (`creatures`, `battles`).
    pub const fn plural(&self) -> &'static str {
        match self {
            Self::Creature => "creatures",
            Self::Battle => "battles",
        }
    }
}

/// Globally unique identity of an object: `(namespace, name)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

/// Whether `name` can be used as a namespace or object name: non-empty, not
/// `.` or `..`, and free of path separators.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Metadata maintained by the store for every object.
///
/// `resource_version` is bumped on every successful write and is the token for
/// optimistic concurrency: a write carrying a stale version is rejected.
/// `generation` only moves when the desired-state half changes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub resource_version: u64,
    #[serde(default)]
    pub generation: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    /// Set by the platform when the object has been asked to go away.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }
}

/// A record type that lives in the store.
///
/// The serialized form is always `{ "metadata": .., "spec": .., "status": .. }`
/// so the store can write the desired-state and observed-state halves
/// independently.
pub trait Resource: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    const KIND: Kind;

    fn metadata(&self) -> &ObjectMeta;

    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    fn key(&self) -> ObjectKey {
        self.metadata().key()
    }

    fn name(&self) -> &str {
        &self.metadata().name
    }

    fn is_marked_for_deletion(&self) -> bool {
        self.metadata().deletion_timestamp.is_some()
    }
}
