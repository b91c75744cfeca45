//! Creature lifecycle: default initialization and single-shot actions.

use std::sync::Arc;

use async_trait::async_trait;
use kubemon_core::{ArenaConfig, Creature, Kind, ObjectKey, PendingAction};
use tracing::{debug, info, warn};

use super::{CreatureView, ReconcileAction, Reconciler, Result};
use crate::store::{Api, ObjectStore};

/// Reconciles `Creature` objects.
///
/// 1. Stop if the creature is gone or marked for deletion.
/// 2. Initialize health and level if unset (see [`CreatureView::new`]).
/// 3. Run the pending action, if it is one we know.
///
/// Creatures are never requeued periodically; the next change to the object
/// is what triggers the next call.
///
/// # Known gap
///
/// `heal` is two writes: health first, then clearing the action. If the
/// second write fails or the step is interrupted between them, the next call
/// sees the action still set and heals again.
pub struct CreatureReconciler {
    store: Arc<dyn ObjectStore>,
    config: ArenaConfig,
}

impl CreatureReconciler {
    pub fn new(store: Arc<dyn ObjectStore>, config: ArenaConfig) -> Self {
        Self { store, config }
    }

    async fn run_action(&self, view: &mut CreatureView, action: PendingAction) -> Result<()> {
        match action {
            PendingAction::Heal => {
                let before = view.health();
                view.add_health(self.config.heal_amount).await?;
                view.clear_pending_action().await?;
                info!(
                    creature = %view.creature().metadata.key(),
                    from = before,
                    to = view.health(),
                    "Healed creature"
                );
            }
            PendingAction::Other(name) => {
                warn!(
                    creature = %view.creature().metadata.key(),
                    action = %name,
                    "Ignoring unknown action"
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Reconciler for CreatureReconciler {
    fn name(&self) -> &'static str {
        "creature"
    }

    fn kind(&self) -> Kind {
        Kind::Creature
    }

    async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileAction> {
        let api = Api::<Creature>::namespaced(self.store.clone(), key.namespace.clone());

        let Some(creature) = api.get_opt(&key.name).await? else {
            debug!(creature = %key, "Creature is gone, nothing to do");
            return Ok(ReconcileAction::Done);
        };

        if creature.metadata.deletion_timestamp.is_some() {
            debug!(creature = %key, "Creature is marked for deletion, stop reconciling");
            return Ok(ReconcileAction::Done);
        }

        let mut view = CreatureView::new(api, creature, &self.config).await?;

        if let Some(action) = view.pending_action() {
            self.run_action(&mut view, action).await?;
        }

        Ok(ReconcileAction::Done)
    }
}
