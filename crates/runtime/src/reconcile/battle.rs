//! Battle state machine: one turn per reconciliation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kubemon_core::{
    ArenaConfig, Battle, BattlePhase, Creature, Kind, ObjectKey, Side, TurnStep,
};
use tracing::{debug, info, warn};

use super::{CreatureView, ReconcileAction, Reconciler, Result};
use crate::store::{Api, ObjectStore};

/// Reconciles `Battle` objects.
///
/// Every call re-derives the battle's phase from the stored records:
///
/// 1. Stop if the battle is gone or marked for deletion.
/// 2. Resolve both creatures. A missing one is recorded in `lastMessage` and
///    the battle waits for an edit of its references.
/// 3. Death check: if a creature is at zero health, the other levels up and
///    the battle deletes itself.
/// 4. Otherwise the side whose turn it is attacks, the turn advances and the
///    battle is requeued after the turn interval.
///
/// The death check runs before any attack, so a battle whose last turn
/// knocked a creature out terminates on the very next call.
///
/// # Known gaps
///
/// Steps are separate writes. Interrupted after the attack but before the
/// turn advance, the next call attacks again with the same side. Interrupted
/// after the level-up but before the delete, the winner levels up again.
pub struct BattleReconciler {
    store: Arc<dyn ObjectStore>,
    config: ArenaConfig,
    turn_interval: Duration,
}

impl BattleReconciler {
    pub const DEFAULT_TURN_INTERVAL: Duration = Duration::from_secs(20);

    pub fn new(store: Arc<dyn ObjectStore>, config: ArenaConfig) -> Self {
        Self {
            store,
            config,
            turn_interval: Self::DEFAULT_TURN_INTERVAL,
        }
    }

    /// Delay between two turns of the same battle.
    pub fn with_turn_interval(mut self, turn_interval: Duration) -> Self {
        self.turn_interval = turn_interval;
        self
    }

    async fn participant(
        &self,
        creatures: &Api<Creature>,
        name: &str,
    ) -> Result<Option<CreatureView>> {
        match creatures.get_opt(name).await? {
            Some(creature) => Ok(Some(
                CreatureView::new(creatures.clone(), creature, &self.config).await?,
            )),
            None => Ok(None),
        }
    }

    /// Overwrite `lastMessage`. Skips the write if it already says this.
    async fn record_message(
        &self,
        battles: &Api<Battle>,
        battle: &Battle,
        message: String,
    ) -> Result<()> {
        if battle.status.last_message.as_deref() == Some(message.as_str()) {
            return Ok(());
        }
        let mut next = battle.clone();
        next.status.last_message = Some(message);
        battles.replace_status(&next).await?;
        Ok(())
    }

    /// A referenced creature does not exist. Only an edit of the battle's
    /// references can fix that, so record it and wait.
    async fn missing_participant(
        &self,
        battles: &Api<Battle>,
        battle: &Battle,
        missing: &ObjectKey,
    ) -> Result<ReconcileAction> {
        warn!(
            battle = %battle.metadata.key(),
            phase = ?BattlePhase::derive(&battle.status, None),
            creature = %missing,
            "Participant not found"
        );
        self.record_message(battles, battle, format!("Could not find creature {missing}"))
            .await?;
        Ok(ReconcileAction::Done)
    }

    async fn finish(
        &self,
        battles: &Api<Battle>,
        battle: &Battle,
        winner: &mut CreatureView,
    ) -> Result<ReconcileAction> {
        winner.level_up().await?;

        match battles.delete(&battle.metadata.name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(battle = %battle.metadata.key(), "Battle already deleted");
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            battle = %battle.metadata.key(),
            winner = winner.name(),
            level = winner.level(),
            turns = battle.status.turn_count,
            "Battle finished"
        );
        Ok(ReconcileAction::Done)
    }

    async fn play_turn(
        &self,
        battles: &Api<Battle>,
        battle: Battle,
        attacker_side: Side,
        a: &mut CreatureView,
        b: &mut CreatureView,
    ) -> Result<ReconcileAction> {
        let (attacker, defender) = match attacker_side {
            Side::A => (&*a, b),
            Side::B => (&*b, a),
        };

        attacker.attack(defender).await?;

        let mut next = battle;
        next.status.advance();
        next.status.last_message = Some(format!(
            "Turn {}: {} hit {} for {} ({} health left)",
            next.status.turn_count,
            attacker.name(),
            defender.name(),
            attacker.strength(),
            defender.health()
        ));
        let stored = battles.replace_status(&next).await?;

        info!(
            battle = %stored.metadata.key(),
            turn = stored.status.turn_count,
            attacker = attacker.name(),
            defender = defender.name(),
            defender_health = defender.health(),
            "Played turn"
        );
        Ok(ReconcileAction::RequeueAfter(self.turn_interval))
    }
}

#[async_trait]
impl Reconciler for BattleReconciler {
    fn name(&self) -> &'static str {
        "battle"
    }

    fn kind(&self) -> Kind {
        Kind::Battle
    }

    async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileAction> {
        let battles = Api::<Battle>::namespaced(self.store.clone(), key.namespace.clone());

        let Some(battle) = battles.get_opt(&key.name).await? else {
            debug!(battle = %key, "Battle is gone, nothing to do");
            return Ok(ReconcileAction::Done);
        };

        if battle.metadata.deletion_timestamp.is_some() {
            debug!(battle = %key, "Battle is marked for deletion, stop reconciling");
            return Ok(ReconcileAction::Done);
        }

        if let Err(e) = battle.spec.validate() {
            warn!(battle = %key, error = %e, "Battle cannot start");
            self.record_message(&battles, &battle, e.to_string()).await?;
            return Ok(ReconcileAction::Done);
        }

        let creatures = Api::<Creature>::namespaced(self.store.clone(), key.namespace.clone());
        let Some(mut a) = self.participant(&creatures, &battle.spec.creature_a).await? else {
            let missing = creatures.key(&battle.spec.creature_a);
            return self.missing_participant(&battles, &battle, &missing).await;
        };
        let Some(mut b) = self.participant(&creatures, &battle.spec.creature_b).await? else {
            let missing = creatures.key(&battle.spec.creature_b);
            return self.missing_participant(&battles, &battle, &missing).await;
        };

        let vitals = (a.vitals(), b.vitals());
        debug!(
            battle = %key,
            phase = ?BattlePhase::derive(&battle.status, Some(vitals)),
            "Resolved participants"
        );

        match TurnStep::decide(vitals.0, vitals.1, battle.status.turn) {
            TurnStep::Finish { winner: Side::A } => self.finish(&battles, &battle, &mut a).await,
            TurnStep::Finish { winner: Side::B } => self.finish(&battles, &battle, &mut b).await,
            TurnStep::Attack { attacker } => {
                self.play_turn(&battles, battle, attacker, &mut a, &mut b)
                    .await
            }
        }
    }
}
