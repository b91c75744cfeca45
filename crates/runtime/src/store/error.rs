//! Error types raised by store implementations.

use kubemon_core::{Kind, ObjectKey};
use thiserror::Error;

/// Errors surfaced by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {key} not found")]
    NotFound { kind: Kind, key: ObjectKey },

    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: Kind, key: ObjectKey },

    #[error(
        "conflict writing {kind} {key}: expected resource version {expected}, stored is {actual}"
    )]
    Conflict {
        kind: Kind,
        key: ObjectKey,
        expected: u64,
        actual: u64,
    },

    #[error("malformed {kind} object: {reason}")]
    Malformed { kind: Kind, reason: String },

    #[error("store lock was poisoned")]
    LockPoisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
