//! Write semantics shared by every store implementation.
//!
//! Stores hold plain JSON. [`Document`] splits a document into its parsed
//! metadata and the remaining top-level fields so the desired/observed split
//! and the resource-version check are implemented once.

use chrono::{DateTime, Utc};
use kubemon_core::{Kind, ObjectKey, ObjectMeta, is_valid_name};
use serde_json::{Map, Value};

use super::error::{Result, StoreError};

const METADATA: &str = "metadata";
const SPEC: &str = "spec";
const STATUS: &str = "status";

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Document {
    kind: Kind,
    meta: ObjectMeta,
    fields: Map<String, Value>,
}

impl Document {
    pub(crate) fn parse(kind: Kind, value: Value) -> Result<Self> {
        let Value::Object(mut fields) = value else {
            return Err(malformed(kind, "document is not a JSON object"));
        };
        let meta = fields
            .remove(METADATA)
            .ok_or_else(|| malformed(kind, "missing metadata"))?;
        let meta: ObjectMeta = serde_json::from_value(meta)
            .map_err(|e| malformed(kind, format!("invalid metadata: {e}")))?;
        if !is_valid_name(&meta.namespace) || !is_valid_name(&meta.name) {
            return Err(malformed(
                kind,
                format!(
                    "invalid identity {:?}/{:?}: namespace and name must be non-empty and contain no path separators",
                    meta.namespace, meta.name
                ),
            ));
        }
        Ok(Self { kind, meta, fields })
    }

    pub(crate) fn key(&self) -> ObjectKey {
        self.meta.key()
    }

    pub(crate) fn resource_version(&self) -> u64 {
        self.meta.resource_version
    }

    pub(crate) fn into_value(self) -> Value {
        let mut fields = self.fields;
        // ObjectMeta only holds strings, integers and a string map.
        let meta = serde_json::to_value(&self.meta).unwrap_or(Value::Null);
        fields.insert(METADATA.to_string(), meta);
        Value::Object(fields)
    }

    /// First version of a new object. Status is only ever written through
    /// the status path, so any status on the incoming document is dropped.
    pub(crate) fn created(mut self, now: DateTime<Utc>) -> Self {
        self.fields.remove(STATUS);
        self.meta.resource_version = 1;
        self.meta.generation = 1;
        self.meta.creation_timestamp = Some(now);
        self.meta.deletion_timestamp = None;
        self
    }

    /// Desired-state write: take the incoming metadata and spec, keep our status.
    pub(crate) fn apply_update(&self, incoming: Document) -> Result<Document> {
        self.check_version(&incoming)?;

        let spec_changed = self.fields.get(SPEC) != incoming.fields.get(SPEC);
        let mut fields = incoming.fields;
        match self.fields.get(STATUS) {
            Some(status) => fields.insert(STATUS.to_string(), status.clone()),
            None => fields.remove(STATUS),
        };

        let mut meta = incoming.meta;
        meta.resource_version = self.meta.resource_version + 1;
        meta.generation = self.meta.generation + u64::from(spec_changed);
        meta.creation_timestamp = self.meta.creation_timestamp;
        meta.deletion_timestamp = self.meta.deletion_timestamp;

        Ok(Document {
            kind: self.kind,
            meta,
            fields,
        })
    }

    /// Observed-state write: take the incoming status, keep everything else.
    pub(crate) fn apply_status_update(&self, incoming: Document) -> Result<Document> {
        self.check_version(&incoming)?;

        let mut next = self.clone();
        match incoming.fields.get(STATUS) {
            Some(status) => next.fields.insert(STATUS.to_string(), status.clone()),
            None => next.fields.remove(STATUS),
        };
        next.meta.resource_version += 1;
        Ok(next)
    }

    /// Returns `None` if the object is already marked.
    pub(crate) fn marked_for_deletion(&self, now: DateTime<Utc>) -> Option<Document> {
        if self.meta.deletion_timestamp.is_some() {
            return None;
        }
        let mut next = self.clone();
        next.meta.deletion_timestamp = Some(now);
        next.meta.resource_version += 1;
        Some(next)
    }

    fn check_version(&self, incoming: &Document) -> Result<()> {
        if incoming.meta.resource_version != self.meta.resource_version {
            return Err(StoreError::Conflict {
                kind: self.kind,
                key: self.key(),
                expected: incoming.meta.resource_version,
                actual: self.meta.resource_version,
            });
        }
        Ok(())
    }
}

fn malformed(kind: Kind, reason: impl Into<String>) -> StoreError {
    StoreError::Malformed {
        kind,
        reason: reason.into(),
    }
}
