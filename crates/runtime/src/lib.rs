//! Reconciliation runtime for the creature arena.
//!
//! This crate holds everything that touches the store: the persistence
//! contract and its implementations, the reconcilers that drive creatures and
//! battles towards their desired state, and the controller harness that feeds
//! them keys.
//!
//! Modules are organized by responsibility:
//! - [`store`] defines [`ObjectStore`], the typed [`Api`] handle, and the
//!   in-memory and file-backed implementations
//! - [`reconcile`] hosts [`CreatureView`] and both reconcilers
//! - [`controller`] turns watch events into queued reconciliations
//! - [`manager`] owns the controllers and their shutdown
pub mod controller;
pub mod manager;
pub mod reconcile;
pub mod store;

mod error;

pub use controller::{BackoffConfig, Controller, WorkQueue};
pub use error::{ManagerError, Result};
pub use manager::{Manager, ManagerBuilder, ManagerConfig};
pub use reconcile::{
    BattleReconciler, CreatureReconciler, CreatureView, ErrorSeverity, ReconcileAction,
    ReconcileError, Reconciler,
};
pub use store::{Api, Change, FileStore, InMemoryStore, ObjectStore, StoreError, WatchEvent};
