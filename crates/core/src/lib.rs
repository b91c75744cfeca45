//! Deterministic arena rules and the persisted record types.
//!
//! `kubemon-core` defines the two entity kinds kept in the external store
//! ([`Creature`] and [`Battle`]), the metadata every stored object carries, and
//! the pure rules the reconcilers apply to them (damage, healing, turn order,
//! death checks). Nothing in this crate touches a store; the runtime crate
//! reads records, asks these types what the next state is, and writes it back.
pub mod battle;
pub mod combat;
pub mod config;
pub mod creature;
pub mod error;
pub mod meta;

pub use battle::{Battle, BattlePhase, BattleSpec, BattleStatus, Side, TurnStep};
pub use combat::{apply_damage, apply_heal};
pub use config::ArenaConfig;
pub use creature::{
    ACTION_ANNOTATION, Creature, CreatureSpec, CreatureStatus, Lifecycle, PendingAction, Vitals,
};
pub use error::SpecError;
pub use meta::{Kind, ObjectKey, ObjectMeta, Resource, is_valid_name};
