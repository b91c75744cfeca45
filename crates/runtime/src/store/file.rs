//! File-based ObjectStore implementation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use kubemon_core::{Kind, ObjectKey, is_valid_name};
use serde_json::Value;
use tokio::sync::broadcast;

use super::object::Document;
use super::traits::{Change, ObjectStore, WatchEvent};
use super::{Result, StoreError};

/// File-based implementation of [`ObjectStore`].
///
/// # File Format
///
/// Each object is a pretty-printed JSON document at
/// `<root>/<plural kind>/<namespace>/<name>.json`. Writes go to a temporary
/// file first and are moved into place with a rename, so a crash mid-write
/// leaves the previous version intact.
///
/// Read-compare-write sequences are serialised by a process-wide lock; the
/// store assumes it is the only writer of its directory.
pub struct FileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
    events: broadcast::Sender<WatchEvent>,
}

impl FileStore {
    /// Open (or create) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        tracing::debug!("Opened file store at {}", root.display());
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
            events: broadcast::channel(256).0,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn kind_dir(&self, kind: Kind) -> PathBuf {
        self.root.join(kind.plural())
    }

    /// Path of `key`'s document. Keys that would leave the kind directory
    /// are rejected.
    fn object_path(&self, kind: Kind, key: &ObjectKey) -> Result<PathBuf> {
        if !is_valid_name(&key.namespace) || !is_valid_name(&key.name) {
            return Err(StoreError::Malformed {
                kind,
                reason: format!("invalid key {:?}/{:?}", key.namespace, key.name),
            });
        }
        Ok(self
            .kind_dir(kind)
            .join(&key.namespace)
            .join(format!("{}.json", key.name)))
    }

    fn read(&self, kind: Kind, key: &ObjectKey) -> Result<Value> {
        match fs::read(self.object_path(kind, key)?) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound {
                kind,
                key: key.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn persist(&self, kind: Kind, key: &ObjectKey, value: &Value) -> Result<()> {
        let path = self.object_path(kind, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("json.tmp");

        fs::write(&temp_path, serde_json::to_vec_pretty(value)?)?;

        // Atomic rename
        fs::rename(&temp_path, &path)?;

        tracing::trace!("Wrote {} {} to {}", kind, key, path.display());
        Ok(())
    }

    fn publish(&self, kind: Kind, key: ObjectKey, change: Change) {
        if self.events.send(WatchEvent { kind, key, change }).is_err() {
            tracing::trace!("No watchers for {} change", kind);
        }
    }

    fn write<F>(&self, kind: Kind, key: &ObjectKey, change: Change, apply: F) -> Result<Value>
    where
        F: FnOnce(Document) -> Result<Document>,
    {
        let value = {
            let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
            let stored = Document::parse(kind, self.read(kind, key)?)?;
            let next = apply(stored)?.into_value();
            self.persist(kind, key, &next)?;
            next
        };
        self.publish(kind, key.clone(), change);
        Ok(value)
    }

    fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = match fs::read_dir(dir) {
            Ok(entries) => entries
                .map(|entry| entry.map(|e| e.path()))
                .collect::<io::Result<Vec<_>>>()?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        entries.sort();
        Ok(entries)
    }

    /// Collect every readable document in `dir`. A file that cannot be read
    /// or parsed is logged and skipped so one bad record does not hide the
    /// rest.
    fn list_namespace(dir: &Path, out: &mut Vec<Value>) -> Result<()> {
        for path in Self::read_dir_sorted(dir)? {
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            let parsed = fs::read(&path)
                .map_err(StoreError::from)
                .and_then(|bytes| Ok(serde_json::from_slice::<Value>(&bytes)?));
            match parsed {
                Ok(value) => out.push(value),
                Err(e) => tracing::warn!("Skipping unreadable {}: {}", path.display(), e),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FileStore {
    async fn get(&self, kind: Kind, key: &ObjectKey) -> Result<Value> {
        self.read(kind, key)
    }

    async fn create(&self, kind: Kind, object: Value) -> Result<Value> {
        let document = Document::parse(kind, object)?.created(Utc::now());
        let key = document.key();
        let value = document.into_value();
        {
            let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
            if self.object_path(kind, &key)?.exists() {
                return Err(StoreError::AlreadyExists { kind, key });
            }
            self.persist(kind, &key, &value)?;
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
            let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
            match fs::remove_file(self.object_path(kind, key)?) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(StoreError::NotFound {
                        kind,
                        key: key.clone(),
                    });
                }
                Err(e) => return Err(e.into()),
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
        let kind_dir = self.kind_dir(kind);
        let mut objects = Vec::new();
        match namespace {
            Some(ns) => Self::list_namespace(&kind_dir.join(ns), &mut objects)?,
            None => {
                for dir in Self::read_dir_sorted(&kind_dir)? {
                    if dir.is_dir() {
                        Self::list_namespace(&dir, &mut objects)?;
                    }
                }
            }
        }
        Ok(objects)
    }

    fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }
}
