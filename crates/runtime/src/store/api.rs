//! Typed access to one kind of object in one namespace.

use std::marker::PhantomData;
use std::sync::Arc;

use kubemon_core::{ObjectKey, Resource};
use serde_json::Value;

use super::traits::ObjectStore;
use super::{Result, StoreError};

/// Typed, namespaced handle over an [`ObjectStore`].
///
/// `replace` and `replace_status` are the two independent write paths
/// (desired state and observed state). Both return the object as stored, with
/// its new resource version; callers should continue from that copy.
pub struct Api<R> {
    store: Arc<dyn ObjectStore>,
    namespace: String,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> Api<R> {
    pub fn namespaced(store: Arc<dyn ObjectStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            _resource: PhantomData,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn key(&self, name: &str) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), name)
    }

    pub async fn get(&self, name: &str) -> Result<R> {
        let value = self.store.get(R::KIND, &self.key(name)).await?;
        decode(value)
    }

    /// Like [`get`](Self::get), with `NotFound` mapped to `None`.
    pub async fn get_opt(&self, name: &str) -> Result<Option<R>> {
        match self.get(name).await {
            Ok(object) => Ok(Some(object)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn create(&self, object: &R) -> Result<R> {
        let value = self.store.create(R::KIND, self.encode(object)?).await?;
        decode(value)
    }

    /// Desired-state write (metadata and spec).
    pub async fn replace(&self, object: &R) -> Result<R> {
        let value = self.store.update(R::KIND, self.encode(object)?).await?;
        decode(value)
    }

    /// Observed-state write (status only).
    pub async fn replace_status(&self, object: &R) -> Result<R> {
        let value = self
            .store
            .update_status(R::KIND, self.encode(object)?)
            .await?;
        decode(value)
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        self.store.delete(R::KIND, &self.key(name)).await
    }

    pub async fn mark_for_deletion(&self, name: &str) -> Result<R> {
        let value = self
            .store
            .mark_for_deletion(R::KIND, &self.key(name))
            .await?;
        decode(value)
    }

    pub async fn list(&self) -> Result<Vec<R>> {
        self.store
            .list(R::KIND, Some(self.namespace.as_str()))
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    fn encode(&self, object: &R) -> Result<Value> {
        if object.metadata().namespace != self.namespace {
            return Err(StoreError::Malformed {
                kind: R::KIND,
                reason: format!(
                    "{} belongs to namespace {:?}, not {:?}",
                    object.name(),
                    object.metadata().namespace,
                    self.namespace
                ),
            });
        }
        Ok(serde_json::to_value(object)?)
    }
}

impl<R> Clone for Api<R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            namespace: self.namespace.clone(),
            _resource: PhantomData,
        }
    }
}

fn decode<R: Resource>(value: Value) -> Result<R> {
    serde_json::from_value(value).map_err(|e| StoreError::Malformed {
        kind: R::KIND,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use kubemon_core::{Creature, CreatureSpec, ObjectMeta};

    fn api() -> Api<Creature> {
        Api::namespaced(Arc::new(InMemoryStore::new()), "default")
    }

    fn mouse() -> Creature {
        Creature::new(
            ObjectMeta::new("default", "mouse"),
            CreatureSpec {
                species: "electric".into(),
                strength: 5,
                owner: Some("ash".into()),
            },
        )
    }

    #[tokio::test]
    async fn typed_round_trip() {
        let api = api();
        let created = api.create(&mouse()).await.unwrap();
        assert_eq!(created.metadata.resource_version, 1);

        let mut next = created.clone();
        next.status.health = Some(10);
        let stored = api.replace_status(&next).await.unwrap();
        assert_eq!(stored.status.health, Some(10));
        assert_eq!(stored.metadata.resource_version, 2);

        assert_eq!(api.get("mouse").await.unwrap(), stored);
        assert_eq!(api.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_opt_maps_missing_to_none() {
        let api = api();
        assert!(api.get_opt("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_objects_from_another_namespace() {
        let api = api();
        let mut stranger = mouse();
        stranger.metadata.namespace = "elsewhere".into();

        let err = api.create(&stranger).await.unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));
    }
}
