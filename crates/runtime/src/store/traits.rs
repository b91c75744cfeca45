//! The persistence contract the reconcilers are written against.

use async_trait::async_trait;
use kubemon_core::{Kind, ObjectKey};
use serde_json::Value;
use tokio::sync::broadcast;

use super::error::Result;

/// What happened to an object, as reported on the watch stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
pub enum Change {
    Created,
    /// Desired-state write (metadata or spec).
    Updated,
    /// Observed-state write only.
    StatusUpdated,
    MarkedForDeletion,
    Deleted,
}

/// Notification published after every successful write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: Kind,
    pub key: ObjectKey,
    pub change: Change,
}

/// Declarative object store with optimistic concurrency.
///
/// Objects travel as JSON documents shaped `{ metadata, spec, status }`. The
/// desired-state half (`metadata` + `spec`) and the observed-state half
/// (`status`) are separate write paths: [`update`](Self::update) never
/// touches the stored status and [`update_status`](Self::update_status) never
/// touches the stored spec, so a writer of one half cannot clobber a
/// concurrent edit of the other.
///
/// Every write must carry the `metadata.resourceVersion` it was derived from;
/// a stale version yields [`StoreError::Conflict`](super::StoreError::Conflict)
/// and the caller is expected to refetch and recompute. Successful writes
/// return the stored document with its new resource version.
///
/// # Implementations
///
/// - [`InMemoryStore`](super::InMemoryStore): process-local, for tests and demos
/// - [`FileStore`](super::FileStore): one JSON file per object, survives restarts
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object. Missing objects are `NotFound`.
    async fn get(&self, kind: Kind, key: &ObjectKey) -> Result<Value>;

    /// Create an object. Assigns resource version 1 and generation 1.
    ///
    /// Used by platform tooling (manifests, tests); reconcilers never create.
    async fn create(&self, kind: Kind, object: Value) -> Result<Value>;

    /// Replace metadata and spec, keeping the stored status.
    async fn update(&self, kind: Kind, object: Value) -> Result<Value>;

    /// Replace status, keeping the stored metadata and spec.
    async fn update_status(&self, kind: Kind, object: Value) -> Result<Value>;

    /// Remove an object. Missing objects are `NotFound`.
    async fn delete(&self, kind: Kind, key: &ObjectKey) -> Result<()>;

    /// Stamp `metadata.deletionTimestamp`, the platform's way of asking
    /// reconcilers to stop acting on an object.
    async fn mark_for_deletion(&self, kind: Kind, key: &ObjectKey) -> Result<Value>;

    /// List objects of a kind, optionally restricted to one namespace, in key order.
    async fn list(&self, kind: Kind, namespace: Option<&str>) -> Result<Vec<Value>>;

    /// Subscribe to write notifications. Delivery is best-effort: a lagging
    /// subscriber loses events and must relist.
    fn subscribe(&self) -> broadcast::Receiver<WatchEvent>;
}
