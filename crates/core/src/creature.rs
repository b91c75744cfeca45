//! The `Creature` record and its lifecycle.

use serde::{Deserialize, Serialize};

use crate::meta::{Kind, ObjectMeta, Resource};

/// Annotation carrying a single-shot action requested by the owner.
///
/// It belongs to the desired-state half, so clearing it goes through the
/// object update path rather than the status path.
///
/// The key is matched exactly. Clients that still write the camel-case
/// `KubeMon/action` key must switch to this one; that key is never read.
pub const ACTION_ANNOTATION: &str = "kubemon/action";

/// A creature as persisted in the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creature {
    pub metadata: ObjectMeta,
    pub spec: CreatureSpec,
    #[serde(default)]
    pub status: CreatureStatus,
}

/// Desired state: what the owner declared.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatureSpec {
    /// Informational only.
    pub species: String,
    /// Damage dealt per attack.
    #[serde(default)]
    pub strength: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// Observed state: what reconciliation produced.
///
/// Both fields are absent until the creature is first reconciled. Once set
/// they are never cleared.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatureStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
}

/// Health and level of an initialized creature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Vitals {
    pub health: u32,
    pub level: u32,
}

impl Vitals {
    pub const fn is_dead(&self) -> bool {
        self.health == 0
    }
}

/// Where a creature is in its lifecycle, derived from [`CreatureStatus`].
///
/// A status with only one of the two fields set (initialization interrupted
/// between its two writes) is still `Uninitialized`; finishing it only writes
/// the missing field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Active(Vitals),
}

impl CreatureStatus {
    pub fn lifecycle(&self) -> Lifecycle {
        match (self.health, self.level) {
            (Some(health), Some(level)) => Lifecycle::Active(Vitals { health, level }),
            _ => Lifecycle::Uninitialized,
        }
    }

    pub fn set_vitals(&mut self, vitals: Vitals) {
        self.health = Some(vitals.health);
        self.level = Some(vitals.level);
    }
}

/// Single-shot action requested through [`ACTION_ANNOTATION`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingAction {
    Heal,
    /// Anything the reconciler does not recognise. Left in place untouched.
    Other(String),
}

impl PendingAction {
    pub const HEAL: &'static str = "heal";

    pub fn parse(value: &str) -> Self {
        match value {
            Self::HEAL => Self::Heal,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Heal => Self::HEAL,
            Self::Other(value) => value,
        }
    }
}

impl Creature {
    pub fn new(metadata: ObjectMeta, spec: CreatureSpec) -> Self {
        Self {
            metadata,
            spec,
            status: CreatureStatus::default(),
        }
    }

    /// The action requested by the owner, if any. An empty annotation counts
    /// as no action.
    pub fn pending_action(&self) -> Option<PendingAction> {
        self.metadata
            .annotations
            .get(ACTION_ANNOTATION)
            .filter(|value| !value.is_empty())
            .map(|value| PendingAction::parse(value))
    }

    pub fn set_pending_action(&mut self, action: &PendingAction) {
        self.metadata
            .annotations
            .insert(ACTION_ANNOTATION.to_string(), action.as_str().to_string());
    }

    /// Removes the action annotation. Returns whether one was present.
    pub fn take_pending_action(&mut self) -> bool {
        self.metadata.annotations.remove(ACTION_ANNOTATION).is_some()
    }
}

impl Resource for Creature {
    const KIND: Kind = Kind::Creature;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
