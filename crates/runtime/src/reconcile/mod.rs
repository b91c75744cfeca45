//! Level-triggered reconciliation of creatures and battles.
//!
//! Each reconciler is a stateless step function: it reads the current record
//! from the store, derives the next state, writes it back and tells the
//! controller when to call again. Nothing is cached between invocations, so a
//! step may be repeated, interrupted or run after a newer write without
//! corrupting state.
//!
//! - [`CreatureView`] wraps one creature and persists every mutation
//! - [`CreatureReconciler`] initializes creatures and runs pending actions
//! - [`BattleReconciler`] advances a battle by one turn per call

mod battle;
mod creature;
mod creature_view;
mod error;

pub use battle::BattleReconciler;
pub use creature::CreatureReconciler;
pub use creature_view::CreatureView;
pub use error::{ErrorSeverity, ReconcileError, Result};

use std::time::Duration;

use async_trait::async_trait;
use kubemon_core::{Kind, ObjectKey};

/// Completion signal of a successful reconciliation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Nothing left to do until the object changes.
    Done,
    /// Call again as soon as possible.
    RequeueNow,
    /// Call again after the delay.
    RequeueAfter(Duration),
}

/// A reconciliation step for one kind of object.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// Human-readable name used in logs.
    fn name(&self) -> &'static str;

    /// The kind whose changes trigger this reconciler.
    fn kind(&self) -> Kind;

    /// Drive the object named by `key` one step towards its desired state.
    ///
    /// A missing object is already handled and returns `Done`.
    async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileAction>;
}
