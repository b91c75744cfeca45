//! Owns both controllers and their shared store.
//!
//! [`Manager`] is what a binary embeds: build it, let it run, call
//! [`Manager::shutdown`] when done.

use std::sync::Arc;
use std::time::Duration;

use kubemon_core::ArenaConfig;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::controller::{BackoffConfig, Controller};
use crate::error::{ManagerError, Result};
use crate::reconcile::{BattleReconciler, CreatureReconciler, Reconciler};
use crate::store::{InMemoryStore, ObjectStore};

/// Configuration shared by both controllers.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub arena: ArenaConfig,
    /// Workers per controller.
    pub workers: usize,
    pub turn_interval: Duration,
    pub backoff: BackoffConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            arena: ArenaConfig::default(),
            workers: 2,
            turn_interval: BattleReconciler::DEFAULT_TURN_INTERVAL,
            backoff: BackoffConfig::default(),
        }
    }
}

type ControllerTask = JoinHandle<()>;

/// Running creature and battle controllers.
pub struct Manager {
    store: Arc<dyn ObjectStore>,
    shutdown_tx: watch::Sender<bool>,
    controllers: Vec<(&'static str, ControllerTask)>,
}

impl Manager {
    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::new()
    }

    /// The store both controllers reconcile against.
    pub fn store(&self) -> Arc<dyn ObjectStore> {
        self.store.clone()
    }

    /// Stop watching, let in-flight reconciliations finish and join the
    /// controllers. The first controller task that panicked is returned.
    pub async fn shutdown(self) -> Result<()> {
        // Receivers may already be gone if a controller exited early.
        let _ = self.shutdown_tx.send(true);

        let mut first_error = None;
        for (controller, handle) in self.controllers {
            let Err(source) = handle.await else {
                continue;
            };
            let outcome = ManagerError::ControllerJoin { controller, source };
            tracing::error!(controller, error = %outcome, "Controller ended with an error");
            first_error.get_or_insert(outcome);
        }

        info!("Manager stopped");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Builder for [`Manager`].
pub struct ManagerBuilder {
    config: ManagerConfig,
    store: Option<Arc<dyn ObjectStore>>,
}

impl ManagerBuilder {
    fn new() -> Self {
        Self {
            config: ManagerConfig::default(),
            store: None,
        }
    }

    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Store to reconcile against. Defaults to a fresh [`InMemoryStore`].
    pub fn store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn turn_interval(mut self, turn_interval: Duration) -> Self {
        self.config.turn_interval = turn_interval;
        self
    }

    /// Spawn both controllers. Must be called within a Tokio runtime.
    pub fn build(self) -> Manager {
        let config = self.config;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryStore::new()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let reconcilers: [Arc<dyn Reconciler>; 2] = [
            Arc::new(CreatureReconciler::new(store.clone(), config.arena)),
            Arc::new(
                BattleReconciler::new(store.clone(), config.arena)
                    .with_turn_interval(config.turn_interval),
            ),
        ];

        let controllers = reconcilers
            .into_iter()
            .map(|reconciler| {
                let name = reconciler.name();
                let controller = Controller::new(store.clone(), reconciler)
                    .workers(config.workers)
                    .backoff(config.backoff);
                (name, tokio::spawn(controller.run(shutdown_rx.clone())))
            })
            .collect();

        info!(
            workers = config.workers,
            turn_interval_ms = config.turn_interval.as_millis() as u64,
            "Manager started"
        );

        Manager {
            store,
            shutdown_tx,
            controllers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_twenty_second_turns() {
        let config = ManagerConfig::default();
        assert_eq!(config.turn_interval, Duration::from_secs(20));
        assert_eq!(config.arena, ArenaConfig::default());
    }

    #[tokio::test]
    async fn starts_and_stops_cleanly() {
        let manager = Manager::builder().workers(1).build();
        assert!(
            manager
                .store()
                .list(kubemon_core::Kind::Creature, None)
                .await
                .unwrap()
                .is_empty()
        );
        manager.shutdown().await.unwrap();
    }
}
