//! In-memory ObjectStore implementation for tests and local runs.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use kubemon_core::{Kind, ObjectKey};
use serde_json::Value;
use tokio::sync::broadcast;

use super::object::Document;
use super::traits::{Change, ObjectStore, WatchEvent};
use super::{Result, StoreError};

/// In-memory implementation of [`ObjectStore`].
///
/// Objects are held as JSON documents keyed by kind and identity. Nothing
/// survives the process; use [`FileStore`](super::FileStore) for that.
pub struct InMemoryStore {
    objects: RwLock<BTreeMap<(Kind, ObjectKey), Value>>,
    events: broadcast::Sender<WatchEvent>,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::with_event_capacity(256)
    }

    /// Create a store whose watch channel buffers `capacity` events.
    pub fn with_event_capacity(capacity: usize) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            events: broadcast::channel(capacity).0,
        }
    }

    /// Number of stored objects of `kind`.
    pub fn count(&self, kind: Kind) -> usize {
        self.objects
            .read()
            .map(|objects| objects.keys().filter(|(k, _)| *k == kind).count())
            .unwrap_or(0)
    }

    fn publish(&self, kind: Kind, key: ObjectKey, change: Change) {
        if self.events.send(WatchEvent { kind, key, change }).is_err() {
            // No subscribers - this is normal, not an error
            tracing::trace!("No watchers for {} change", kind);
        }
    }

    fn write<F>(&self, kind: Kind, key: &ObjectKey, change: Change, apply: F) -> Result<Value>
    where
        F: FnOnce(Document) -> Result<Document>,
    {
        let value = {
            let mut objects = self
                .objects
                .write()
                .map_err(|_| StoreError::LockPoisoned)?;
            let slot = objects
                .get_mut(&(kind, key.clone()))
                .ok_or_else(|| StoreError::NotFound {
                    kind,
                    key: key.clone(),
                })?;
            let stored = Document::parse(kind, slot.clone())?;
            let next = apply(stored)?.into_value();
            *slot = next.clone();
            next
        };
        self.publish(kind, key.clone(), change);
        Ok(value)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get(&self, kind: Kind, key: &ObjectKey) -> Result<Value> {
        let objects = self.objects.read().map_err(|_| StoreError::LockPoisoned)?;
        objects
            .get(&(kind, key.clone()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind,
                key: key.clone(),
            })
    }

    async fn create(&self, kind: Kind, object: Value) -> Result<Value> {
        let document = Document::parse(kind, object)?.created(Utc::now());
        let key = document.key();
        let value = document.into_value();
        {
            let mut objects = self
                .objects
                .write()
                .map_err(|_| StoreError::LockPoisoned)?;
            if objects.contains_key(&(kind, key.clone())) {
                return Err(StoreError::AlreadyExists { kind, key });
            }
            objects.insert((kind, key.clone()), value.clone());
        }
        self.publish(kind, key, Change::Created);
        Ok(value)
    }

    async fn update(&self, kind: Kind, object: Value) -> Result<Value> {
        let incoming = Document::parse(kind, object)?;
        let key = incoming.key();
        self.write(kind, &key, Change::Updated, |stored| {
            stored.apply_update(incoming)
        })
    }

    async fn update_status(&self, kind: Kind, object: Value) -> Result<Value> {
        let incoming = Document::parse(kind, object)?;
        let key = incoming.key();
        self.write(kind, &key, Change::StatusUpdated, |stored| {
            stored.apply_status_update(incoming)
        })
    }

    async fn delete(&self, kind: Kind, key: &ObjectKey) -> Result<()> {
        {
            let mut objects = self
                .objects
                .write()
                .map_err(|_| StoreError::LockPoisoned)?;
            if objects.remove(&(kind, key.clone())).is_none() {
                return Err(StoreError::NotFound {
                    kind,
                    key: key.clone(),
                });
            }
        }
        self.publish(kind, key.clone(), Change::Deleted);
        Ok(())
    }

    async fn mark_for_deletion(&self, kind: Kind, key: &ObjectKey) -> Result<Value> {
        let now = Utc::now();
        self.write(kind, key, Change::MarkedForDeletion, |stored| {
            Ok(stored.marked_for_deletion(now).unwrap_or(stored))
        })
    }

    async fn list(&self, kind: Kind, namespace: Option<&str>) -> Result<Vec<Value>> {
        let objects = self.objects.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(objects
            .iter()
            .filter(|((k, key), _)| {
                *k == kind && namespace.is_none_or(|ns| key.namespace == ns)
            })
            .map(|(_, value)| value.clone())
            .collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }
}
