//! A creature wrapped with guarded, self-persisting mutators.

use kubemon_core::{
    ArenaConfig, Creature, Lifecycle, PendingAction, Resource, Vitals, apply_damage, apply_heal,
};
use tracing::{debug, info};

use crate::store::{Api, Result};

/// One creature plus the handle needed to write it back.
///
/// The view owns its copy of the record for the duration of one
/// reconciliation. Every mutator writes immediately: health and level go
/// through the status path, the pending action through the object path. After
/// a successful write the view continues from the stored copy, so consecutive
/// writes carry the right resource version. A failed write leaves the view as
/// it was before the call.
pub struct CreatureView {
    api: Api<Creature>,
    creature: Creature,
    vitals: Vitals,
}

impl CreatureView {
    /// Wrap `creature`, finishing its initialization if needed.
    ///
    /// Missing health and level are written one at a time, health first. An
    /// interruption between the two leaves health set and level unset, which
    /// the next construction completes without touching health.
    pub async fn new(api: Api<Creature>, creature: Creature, config: &ArenaConfig) -> Result<Self> {
        if let Lifecycle::Active(vitals) = creature.status.lifecycle() {
            return Ok(Self {
                api,
                creature,
                vitals,
            });
        }

        let mut creature = creature;
        let health = match creature.status.health {
            Some(health) => health,
            None => {
                creature.status.health = Some(config.initial_health);
                creature = api.replace_status(&creature).await?;
                config.initial_health
            }
        };
        let level = match creature.status.level {
            Some(level) => level,
            None => {
                creature.status.level = Some(config.initial_level);
                creature = api.replace_status(&creature).await?;
                config.initial_level
            }
        };
        info!(
            creature = %creature.key(),
            health,
            level,
            "Initialized creature"
        );

        Ok(Self {
            api,
            creature,
            vitals: Vitals { health, level },
        })
    }

    /// Fetch `name` and wrap it.
    pub async fn load(api: Api<Creature>, name: &str, config: &ArenaConfig) -> Result<Self> {
        let creature = api.get(name).await?;
        Self::new(api, creature, config).await
    }

    pub fn name(&self) -> &str {
        self.creature.name()
    }

    pub fn creature(&self) -> &Creature {
        &self.creature
    }

    pub fn vitals(&self) -> Vitals {
        self.vitals
    }

    pub fn health(&self) -> u32 {
        self.vitals.health
    }

    pub fn level(&self) -> u32 {
        self.vitals.level
    }

    pub fn strength(&self) -> u32 {
        self.creature.spec.strength
    }

    pub fn is_dead(&self) -> bool {
        self.vitals.is_dead()
    }

    pub async fn set_health(&mut self, health: u32) -> Result<()> {
        self.persist_vitals(Vitals {
            health,
            ..self.vitals
        })
        .await
    }

    pub async fn add_health(&mut self, amount: u32) -> Result<()> {
        self.set_health(apply_heal(self.vitals.health, amount)).await
    }

    /// `health' = max(0, health - damage)`.
    pub async fn apply_damage(&mut self, damage: u32) -> Result<()> {
        self.set_health(apply_damage(self.vitals.health, damage))
            .await
    }

    /// Deal this creature's strength as damage to `target`.
    pub async fn attack(&self, target: &mut CreatureView) -> Result<()> {
        target.apply_damage(self.strength()).await
    }

    pub async fn set_level(&mut self, level: u32) -> Result<()> {
        self.persist_vitals(Vitals {
            level,
            ..self.vitals
        })
        .await
    }

    pub async fn level_up(&mut self) -> Result<()> {
        self.set_level(self.vitals.level.saturating_add(1)).await
    }

    pub fn pending_action(&self) -> Option<PendingAction> {
        self.creature.pending_action()
    }

    /// Remove the pending action through the desired-state path.
    pub async fn clear_pending_action(&mut self) -> Result<()> {
        let mut next = self.creature.clone();
        if !next.take_pending_action() {
            debug!(creature = %self.creature.key(), "No pending action to clear");
            return Ok(());
        }
        self.creature = self.api.replace(&next).await?;
        Ok(())
    }

    async fn persist_vitals(&mut self, vitals: Vitals) -> Result<()> {
        let mut next = self.creature.clone();
        next.status.set_vitals(vitals);
        self.creature = self.api.replace_status(&next).await?;
        self.vitals = vitals;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::{InMemoryStore, ObjectStore};
    use kubemon_core::{CreatureSpec, CreatureStatus, ObjectMeta};

    fn api() -> (Arc<InMemoryStore>, Api<Creature>) {
        let store = Arc::new(InMemoryStore::new());
        let api = Api::namespaced(store.clone() as Arc<dyn ObjectStore>, "default");
        (store, api)
    }

    fn creature(name: &str, strength: u32, status: CreatureStatus) -> Creature {
        let mut creature = Creature::new(
            ObjectMeta::new("default", name),
            CreatureSpec {
                species: "test".into(),
                strength,
                owner: None,
            },
        );
        creature.status = status;
        creature
    }

    async fn seeded(api: &Api<Creature>, creature: Creature) -> Creature {
        let created = api.create(&creature).await.unwrap();
        if creature.status == CreatureStatus::default() {
            return created;
        }
        let mut next = created;
        next.status = creature.status;
        api.replace_status(&next).await.unwrap()
    }

    #[tokio::test]
    async fn construction_initializes_defaults() {
        let (_, api) = api();
        let stored = seeded(&api, creature("x", 1, CreatureStatus::default())).await;

        let view = CreatureView::new(api.clone(), stored, &ArenaConfig::default())
            .await
            .unwrap();
        assert_eq!(view.health(), 10);
        assert_eq!(view.level(), 1);

        let persisted = api.get("x").await.unwrap();
        assert_eq!(persisted.status.health, Some(10));
        assert_eq!(persisted.status.level, Some(1));
    }

    #[tokio::test]
    async fn construction_resumes_partial_initialization() {
        let (_, api) = api();
        let partial = CreatureStatus {
            health: Some(4),
            level: None,
        };
        let stored = seeded(&api, creature("x", 1, partial)).await;

        let view = CreatureView::new(api.clone(), stored, &ArenaConfig::default())
            .await
            .unwrap();
        assert_eq!(view.health(), 4);
        assert_eq!(view.level(), 1);
    }

    #[tokio::test]
    async fn initialized_creature_is_not_rewritten() {
        let (_, api) = api();
        let active = CreatureStatus {
            health: Some(7),
            level: Some(3),
        };
        let stored = seeded(&api, creature("x", 1, active)).await;
        let version = stored.metadata.resource_version;

        CreatureView::load(api.clone(), "x", &ArenaConfig::default())
            .await
            .unwrap();
        assert_eq!(
            api.get("x").await.unwrap().metadata.resource_version,
            version
        );
    }

    #[tokio::test]
    async fn damage_clamps_at_zero() {
        let (_, api) = api();
        seeded(&api, creature("x", 1, CreatureStatus::default())).await;
        let mut view = CreatureView::load(api.clone(), "x", &ArenaConfig::default())
            .await
            .unwrap();

        view.apply_damage(4).await.unwrap();
        assert_eq!(view.health(), 6);
        view.apply_damage(100).await.unwrap();
        assert_eq!(view.health(), 0);
        assert!(view.is_dead());
        assert_eq!(api.get("x").await.unwrap().status.health, Some(0));
    }

    #[tokio::test]
    async fn attack_uses_attacker_strength() {
        let (_, api) = api();
        seeded(&api, creature("x", 5, CreatureStatus::default())).await;
        seeded(&api, creature("y", 3, CreatureStatus::default())).await;
        let config = ArenaConfig::default();
        let x = CreatureView::load(api.clone(), "x", &config).await.unwrap();
        let mut y = CreatureView::load(api.clone(), "y", &config).await.unwrap();

        x.attack(&mut y).await.unwrap();
        assert_eq!(y.health(), 5);
        assert_eq!(api.get("y").await.unwrap().status.health, Some(5));
        assert_eq!(api.get("x").await.unwrap().status.health, Some(10));
    }

    #[tokio::test]
    async fn level_up_and_set_level() {
        let (_, api) = api();
        seeded(&api, creature("x", 1, CreatureStatus::default())).await;
        let mut view = CreatureView::load(api.clone(), "x", &ArenaConfig::default())
            .await
            .unwrap();

        view.level_up().await.unwrap();
        assert_eq!(view.level(), 2);
        view.set_level(9).await.unwrap();
        assert_eq!(api.get("x").await.unwrap().status.level, Some(9));
    }

    #[tokio::test]
    async fn stale_view_fails_and_stays_unchanged() {
        let (_, api) = api();
        seeded(&api, creature("x", 1, CreatureStatus::default())).await;
        let config = ArenaConfig::default();
        let mut stale = CreatureView::load(api.clone(), "x", &config).await.unwrap();
        let mut fresh = CreatureView::load(api.clone(), "x", &config).await.unwrap();

        fresh.apply_damage(2).await.unwrap();
        let err = stale.apply_damage(5).await.unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(stale.health(), 10);
        assert_eq!(api.get("x").await.unwrap().status.health, Some(8));
    }

    #[tokio::test]
    async fn clearing_action_keeps_status() {
        let (_, api) = api();
        let mut heal = creature("x", 1, CreatureStatus::default());
        heal.set_pending_action(&PendingAction::Heal);
        seeded(&api, heal).await;
        let mut view = CreatureView::load(api.clone(), "x", &ArenaConfig::default())
            .await
            .unwrap();

        assert_eq!(view.pending_action(), Some(PendingAction::Heal));
        view.add_health(10).await.unwrap();
        view.clear_pending_action().await.unwrap();

        let stored = api.get("x").await.unwrap();
        assert_eq!(stored.pending_action(), None);
        assert_eq!(stored.status.health, Some(20));
        assert_eq!(view.pending_action(), None);

        // second clear is a no-op
        let version = stored.metadata.resource_version;
        view.clear_pending_action().await.unwrap();
        assert_eq!(
            api.get("x").await.unwrap().metadata.resource_version,
            version
        );
    }
}
