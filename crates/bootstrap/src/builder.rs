//! Builds the store and manager from an [`OperatorConfig`].
use std::sync::Arc;

use anyhow::{Context, Result};
use kubemon_runtime::{FileStore, InMemoryStore, Manager, ObjectStore};
use tracing::info;

use crate::config::OperatorConfig;
use crate::manifest::{ApplySummary, Manifest};

/// Assembles the store, seeds it from the manifest and starts the manager.
pub struct OperatorBuilder {
    config: OperatorConfig,
    store: Option<Arc<dyn ObjectStore>>,
}

impl OperatorBuilder {
    pub fn new(config: OperatorConfig) -> Self {
        Self {
            config,
            store: None,
        }
    }

    /// Use this store instead of the one the config selects.
    pub fn store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Open the store, apply the manifest and spawn the controllers. Must be
    /// awaited within a Tokio runtime.
    pub async fn build(self) -> Result<OperatorSetup> {
        let store = match self.store {
            Some(store) => store,
            None => open_store(&self.config)?,
        };

        let applied = match &self.config.manifest {
            Some(path) => {
                let manifest = Manifest::load(path)
                    .with_context(|| format!("Failed to load manifest {}", path.display()))?;
                Some(manifest.apply(store.clone()).await?)
            }
            None => None,
        };

        let manager = Manager::builder()
            .config(self.config.manager.clone())
            .store(store)
            .build();

        Ok(OperatorSetup {
            config: self.config,
            applied,
            manager,
        })
    }
}

pub struct OperatorSetup {
    pub config: OperatorConfig,
    /// `None` when no manifest was configured.
    pub applied: Option<ApplySummary>,
    pub manager: Manager,
}

/// File store under `state_dir` when configured, in-memory otherwise.
pub fn open_store(config: &OperatorConfig) -> Result<Arc<dyn ObjectStore>> {
    match &config.state_dir {
        Some(dir) => {
            let store = FileStore::open(dir)
                .with_context(|| format!("Failed to open state directory {}", dir.display()))?;
            info!("Using file store at {}", dir.display());
            Ok(Arc::new(store))
        }
        None => {
            info!("Using in-memory store; objects are lost on exit");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}
