//! Failures a reconciliation step hands back to the controller.

use thiserror::Error;

use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, ReconcileError>;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How the controller should treat a failed reconciliation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Lost an optimistic-concurrency race. Refetch and recompute right away.
    Conflict,
    /// Store unavailable or otherwise failing. Retry with backoff.
    Transient,
    /// The stored record cannot be decoded. Retrying will not help; the key is
    /// dropped until the record changes.
    Fatal,
}

impl ErrorSeverity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Conflict => "conflict",
            Self::Transient => "transient",
            Self::Fatal => "fatal",
        }
    }
}

impl ReconcileError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Store(StoreError::Conflict { .. }) => ErrorSeverity::Conflict,
            Self::Store(StoreError::Malformed { .. } | StoreError::Json(_)) => ErrorSeverity::Fatal,
            Self::Store(_) => ErrorSeverity::Transient,
        }
    }
}
