//! Validation errors for records whose desired state cannot be acted on.

use thiserror::Error;

/// A record's spec is well-formed JSON but describes something the arena
/// cannot run. These are never retried; an operator has to edit the record.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("battle needs two different creatures, both sides name {0}")]
    SameCreature(String),

    #[error("battle reference for side {0} is empty")]
    EmptyReference(crate::Side),

    #[error("battle reference for side {side} is not a valid creature name: {name:?}")]
    InvalidReference { side: crate::Side, name: String },
}
