//! RON manifests describing the creatures and battles to create at start.
//!
//! ```ron
//! (
//!     namespace: "arena",
//!     creatures: [
//!         (name: "pikachu", species: "electric-mouse", strength: 5, owner: Some("ash")),
//!         (name: "onix", species: "rock-snake", strength: 3),
//!     ],
//!     battles: [
//!         (name: "gym", creature_a: "pikachu", creature_b: "onix"),
//!     ],
//! )
//! ```
//!
//! Applying a manifest only creates. Objects that already exist are left
//! untouched, so a restart against a persistent store does not reset them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kubemon_core::{Battle, BattleSpec, Creature, CreatureSpec, ObjectMeta, PendingAction, Resource};
use kubemon_runtime::{Api, ObjectStore, StoreError};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest")]
    Parse(#[from] ron::error::SpannedError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Debug, Deserialize)]
pub struct Manifest {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub creatures: Vec<CreatureEntry>,
    #[serde(default)]
    pub battles: Vec<BattleEntry>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CreatureEntry {
    pub name: String,
    pub species: String,
    #[serde(default)]
    pub strength: u32,
    #[serde(default)]
    pub owner: Option<String>,
    /// Pending action to start with, e.g. `Some("heal")`.
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BattleEntry {
    pub name: String,
    pub creature_a: String,
    pub creature_b: String,
}

/// What [`Manifest::apply`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub created: usize,
    pub skipped: usize,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl Manifest {
    pub fn from_ron(text: &str) -> Result<Self, ManifestError> {
        Ok(ron::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron(&text)
    }

    pub fn creatures(&self) -> impl Iterator<Item = Creature> + '_ {
        self.creatures.iter().map(|entry| {
            let mut creature = Creature::new(
                ObjectMeta::new(&self.namespace, &entry.name),
                CreatureSpec {
                    species: entry.species.clone(),
                    strength: entry.strength,
                    owner: entry.owner.clone(),
                },
            );
            if let Some(action) = &entry.action {
                creature.set_pending_action(&PendingAction::parse(action));
            }
            creature
        })
    }

    pub fn battles(&self) -> impl Iterator<Item = Battle> + '_ {
        self.battles.iter().map(|entry| {
            Battle::new(
                ObjectMeta::new(&self.namespace, &entry.name),
                BattleSpec {
                    creature_a: entry.creature_a.clone(),
                    creature_b: entry.creature_b.clone(),
                },
            )
        })
    }

    /// Create every object that does not exist yet. Creatures go first so
    /// battles find their participants on the first pass.
    pub async fn apply(&self, store: Arc<dyn ObjectStore>) -> Result<ApplySummary, ManifestError> {
        let creatures = Api::<Creature>::namespaced(store.clone(), self.namespace.clone());
        let battles = Api::<Battle>::namespaced(store, self.namespace.clone());

        let mut summary = ApplySummary::default();
        for creature in self.creatures() {
            create(&creatures, &creature, &mut summary).await?;
        }
        for battle in self.battles() {
            create(&battles, &battle, &mut summary).await?;
        }

        info!(
            namespace = %self.namespace,
            created = summary.created,
            skipped = summary.skipped,
            "Applied manifest"
        );
        Ok(summary)
    }
}

async fn create<R: Resource>(
    api: &Api<R>,
    object: &R,
    summary: &mut ApplySummary,
) -> Result<(), ManifestError> {
    match api.create(object).await {
        Ok(_) => {
            summary.created += 1;
            Ok(())
        }
        Err(e) if e.is_already_exists() => {
            debug!(kind = %R::KIND, key = %object.key(), "Already exists, skipping");
            summary.skipped += 1;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARENA: &str = r#"
        (
            namespace: "arena",
            creatures: [
                (name: "pikachu", species: "electric-mouse", strength: 5, owner: Some("ash")),
                (name: "onix", species: "rock-snake", strength: 3, action: Some("heal")),
            ],
            battles: [
                (name: "gym", creature_a: "pikachu", creature_b: "onix"),
            ],
        )
    "#;

    #[test]
    fn parses_full_manifest() {
        let manifest = Manifest::from_ron(ARENA).unwrap();
        assert_eq!(manifest.namespace, "arena");

        let creatures: Vec<_> = manifest.creatures().collect();
        assert_eq!(creatures.len(), 2);
        assert_eq!(creatures[0].spec.owner.as_deref(), Some("ash"));
        assert_eq!(creatures[1].pending_action(), Some(PendingAction::Heal));
        assert_eq!(creatures[1].metadata.namespace, "arena");

        let battles: Vec<_> = manifest.battles().collect();
        assert_eq!(battles[0].spec.creature_b, "onix");
    }

    #[test]
    fn namespace_and_lists_default() {
        let manifest = Manifest::from_ron("(creatures: [(name: \"x\", species: \"y\")])").unwrap();
        assert_eq!(manifest.namespace, "default");
        assert!(manifest.battles.is_empty());
        assert_eq!(manifest.creatures[0].strength, 0);
    }

    #[test]
    fn rejects_malformed_ron() {
        let err = Manifest::from_ron("(creatures: [(name: 3)])").unwrap_err();
        assert!(matches!(err, ManifestError::Parse(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Manifest::load("/nonexistent/arena.ron").unwrap_err();
        match err {
            ManifestError::Read { path, .. } => {
                assert_eq!(path, PathBuf::from("/nonexistent/arena.ron"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
