//! Level-triggered controller loop: watch one kind, queue keys, reconcile.
//!
//! Stands in for the orchestration platform. Watch events only say *which*
//! object changed; the reconciler always re-reads the object itself.

mod backoff;
mod queue;

pub use backoff::BackoffConfig;
pub use queue::WorkQueue;

use std::sync::Arc;

use kubemon_core::{Kind, ObjectKey};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::reconcile::{ErrorSeverity, ReconcileAction, Reconciler};
use crate::store::object::Document;
use crate::store::{Change, ObjectStore, StoreError, WatchEvent};

use backoff::Backoff;

/// Drives one [`Reconciler`] from the store's watch stream.
pub struct Controller {
    store: Arc<dyn ObjectStore>,
    reconciler: Arc<dyn Reconciler>,
    queue: WorkQueue,
    backoff: BackoffConfig,
    workers: usize,
}

impl Controller {
    pub fn new(store: Arc<dyn ObjectStore>, reconciler: Arc<dyn Reconciler>) -> Self {
        Self {
            store,
            reconciler,
            queue: WorkQueue::new(),
            backoff: BackoffConfig::default(),
            workers: 1,
        }
    }

    /// Number of concurrent workers. Distinct keys are processed in
    /// parallel; the same key never is.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Handle to the controller's queue, for manual enqueueing.
    pub fn queue(&self) -> WorkQueue {
        self.queue.clone()
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// Subscribes before the initial list so no change between the two is
    /// lost. A failed initial list is logged; the controller keeps serving
    /// watch events and relists on the next lag. Workers finish their current
    /// key before returning.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let kind = self.reconciler.kind();
        let name = self.reconciler.name();
        let mut events = self.store.subscribe();

        if let Err(e) = self.enqueue_all(kind).await {
            error!(controller = name, error = %e, "Initial list failed");
        }

        let backoff = Arc::new(Backoff::new(self.backoff));
        let workers: Vec<JoinHandle<()>> = (0..self.workers)
            .map(|id| {
                let worker = Worker {
                    id,
                    reconciler: self.reconciler.clone(),
                    queue: self.queue.clone(),
                    backoff: backoff.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();
        info!(controller = name, %kind, workers = self.workers, "Controller started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                event = events.recv() => match event {
                    Ok(event) => self.on_event(kind, event),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(controller = name, missed, "Watch stream lagged, relisting");
                        if let Err(e) = self.enqueue_all(kind).await {
                            error!(controller = name, error = %e, "Relist failed");
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!(controller = name, "Watch stream closed");
                        break;
                    }
                },
            }
        }

        self.queue.shutdown();
        for handle in workers {
            if let Err(e) = handle.await {
                error!(controller = name, error = %e, "Worker task failed");
            }
        }
        info!(controller = name, "Controller stopped");
    }

    fn on_event(&self, kind: Kind, event: WatchEvent) {
        if event.kind != kind {
            return;
        }
        // Our own status writes would otherwise retrigger every reconcile.
        if event.change == Change::StatusUpdated {
            return;
        }
        debug!(key = %event.key, change = %event.change, "Queueing");
        self.queue.add(event.key);
    }

    async fn enqueue_all(&self, kind: Kind) -> Result<(), StoreError> {
        for value in self.store.list(kind, None).await? {
            match Document::parse(kind, value) {
                Ok(document) => self.queue.add(document.key()),
                Err(e) => warn!(%kind, error = %e, "Skipping unreadable object"),
            }
        }
        Ok(())
    }
}

struct Worker {
    id: usize,
    reconciler: Arc<dyn Reconciler>,
    queue: WorkQueue,
    backoff: Arc<Backoff>,
}

impl Worker {
    async fn run(self) {
        while let Some(key) = self.queue.next().await {
            self.process(&key).await;
            self.queue.done(&key);
        }
        debug!(controller = self.reconciler.name(), worker = self.id, "Worker exiting");
    }

    async fn process(&self, key: &ObjectKey) {
        let name = self.reconciler.name();
        match self.reconciler.reconcile(key).await {
            Ok(ReconcileAction::Done) => {
                self.backoff.forget(key);
            }
            Ok(ReconcileAction::RequeueNow) => {
                self.backoff.forget(key);
                self.queue.add(key.clone());
            }
            Ok(ReconcileAction::RequeueAfter(delay)) => {
                self.backoff.forget(key);
                self.queue.add_after(key.clone(), delay);
            }
            Err(e) => match e.severity() {
                ErrorSeverity::Conflict => {
                    debug!(controller = name, %key, error = %e, "Conflict, retrying");
                    self.queue.add(key.clone());
                }
                ErrorSeverity::Transient => {
                    let delay = self.backoff.next_delay(key);
                    warn!(
                        controller = name,
                        %key,
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "Reconcile failed"
                    );
                    self.queue.add_after(key.clone(), delay);
                }
                ErrorSeverity::Fatal => {
                    error!(controller = name, %key, error = %e, "Dropping key");
                    self.backoff.forget(key);
                }
            },
        }
    }
}
