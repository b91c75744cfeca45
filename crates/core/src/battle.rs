//! The `Battle` record and the turn state machine.
//!
//! A battle is never stored with an explicit phase. Each reconciliation
//! derives it from the battle's status and the two participants' vitals:
//!
//! ```text
//! AwaitingParticipants --both found--> InProgress(turn) --health == 0--> Terminated
//!          ^                                 |
//!          +---- participant missing --------+
//! ```

use serde::{Deserialize, Serialize};

use crate::creature::Vitals;
use crate::error::SpecError;
use crate::meta::{Kind, ObjectMeta, Resource, is_valid_name};

/// One of the two participants of a battle.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
pub enum Side {
    #[default]
    A,
    B,
}

impl Side {
    pub const fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// A battle as persisted in the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Battle {
    pub metadata: ObjectMeta,
    pub spec: BattleSpec,
    #[serde(default)]
    pub status: BattleStatus,
}

/// Desired state: the two creatures, by name, in the battle's namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleSpec {
    pub creature_a: String,
    pub creature_b: String,
}

/// Observed state: whose turn it is and how far the battle has come.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleStatus {
    #[serde(default)]
    pub turn: Side,
    #[serde(default)]
    pub turn_count: u64,
    /// Last diagnostic, overwritten on every write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
}

impl BattleSpec {
    pub fn creature(&self, side: Side) -> &str {
        match side {
            Side::A => &self.creature_a,
            Side::B => &self.creature_b,
        }
    }

    pub fn validate(&self) -> Result<(), SpecError> {
        for side in [Side::A, Side::B] {
            let name = self.creature(side);
            if name.is_empty() {
                return Err(SpecError::EmptyReference(side));
            }
            if !is_valid_name(name) {
                return Err(SpecError::InvalidReference {
                    side,
                    name: name.to_string(),
                });
            }
        }
        if self.creature_a == self.creature_b {
            return Err(SpecError::SameCreature(self.creature_a.clone()));
        }
        Ok(())
    }
}

impl BattleStatus {
    /// Completes a turn: one more turn on the clock, the other side acts next.
    pub fn advance(&mut self) {
        self.turn_count += 1;
        self.turn = self.turn.other();
    }
}

impl Battle {
    pub fn new(metadata: ObjectMeta, spec: BattleSpec) -> Self {
        Self {
            metadata,
            spec,
            status: BattleStatus::default(),
        }
    }
}

impl Resource for Battle {
    const KIND: Kind = Kind::Battle;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

/// What a single reconciliation of an in-progress battle does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnStep {
    /// One side is down: the winner levels up and the battle is removed.
    Finish { winner: Side },
    /// The side whose turn it is attacks the other.
    Attack { attacker: Side },
}

impl TurnStep {
    /// Death check first, then attack.
    ///
    /// Only one creature loses health per turn, so at most one side can be at
    /// zero when this runs. If both are (edited externally), side A is checked
    /// first and B wins.
    pub const fn decide(a: Vitals, b: Vitals, turn: Side) -> Self {
        if a.is_dead() {
            Self::Finish { winner: Side::B }
        } else if b.is_dead() {
            Self::Finish { winner: Side::A }
        } else {
            Self::Attack { attacker: turn }
        }
    }
}

/// Derived phase of a battle, used for logging and diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BattlePhase {
    AwaitingParticipants,
    InProgress { turn: Side, turn_count: u64 },
    Terminated { winner: Side },
}

impl BattlePhase {
    /// `participants` is `None` while either creature cannot be resolved.
    pub const fn derive(status: &BattleStatus, participants: Option<(Vitals, Vitals)>) -> Self {
        match participants {
            None => Self::AwaitingParticipants,
            Some((a, b)) => match TurnStep::decide(a, b, status.turn) {
                TurnStep::Finish { winner } => Self::Terminated { winner },
                TurnStep::Attack { .. } => Self::InProgress {
                    turn: status.turn,
                    turn_count: status.turn_count,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALIVE: Vitals = Vitals {
        health: 10,
        level: 1,
    };
    const DEAD: Vitals = Vitals {
        health: 0,
        level: 1,
    };

    #[test]
    fn advance_alternates_and_counts() {
        let mut status = BattleStatus::default();
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(status.turn);
            status.advance();
        }

        assert_eq!(seen, vec![Side::A, Side::B, Side::A, Side::B, Side::A]);
        assert_eq!(status.turn_count, 5);
        assert_eq!(status.turn, Side::B);
    }

    #[test]
    fn death_check_precedes_attack() {
        assert_eq!(
            TurnStep::decide(DEAD, ALIVE, Side::A),
            TurnStep::Finish { winner: Side::B }
        );
        assert_eq!(
            TurnStep::decide(ALIVE, DEAD, Side::B),
            TurnStep::Finish { winner: Side::A }
        );
        assert_eq!(
            TurnStep::decide(ALIVE, ALIVE, Side::B),
            TurnStep::Attack { attacker: Side::B }
        );
        assert_eq!(
            TurnStep::decide(DEAD, DEAD, Side::A),
            TurnStep::Finish { winner: Side::B }
        );
    }

    #[test]
    fn phase_derivation() {
        let status = BattleStatus {
            turn: Side::B,
            turn_count: 3,
            last_message: None,
        };

        assert_eq!(
            BattlePhase::derive(&status, None),
            BattlePhase::AwaitingParticipants
        );
        assert_eq!(
            BattlePhase::derive(&status, Some((ALIVE, ALIVE))),
            BattlePhase::InProgress {
                turn: Side::B,
                turn_count: 3
            }
        );
        assert_eq!(
            BattlePhase::derive(&status, Some((ALIVE, DEAD))),
            BattlePhase::Terminated { winner: Side::A }
        );
    }

    #[test]
    fn spec_validation() {
        let spec = BattleSpec {
            creature_a: "x".into(),
            creature_b: "y".into(),
        };
        assert!(spec.validate().is_ok());
        assert_eq!(spec.creature(Side::B), "y");

        let same = BattleSpec {
            creature_a: "x".into(),
            creature_b: "x".into(),
        };
        assert_eq!(same.validate(), Err(SpecError::SameCreature("x".into())));

        let empty = BattleSpec {
            creature_a: "x".into(),
            creature_b: String::new(),
        };
        assert_eq!(empty.validate(), Err(SpecError::EmptyReference(Side::B)));

        for name in ["../other/x", "a/b", "..", "c\\d"] {
            let escaping = BattleSpec {
                creature_a: name.into(),
                creature_b: "y".into(),
            };
            assert_eq!(
                escaping.validate(),
                Err(SpecError::InvalidReference {
                    side: Side::A,
                    name: name.into(),
                })
            );
        }
    }

    #[test]
    fn status_wire_shape() {
        let status: BattleStatus = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(status, BattleStatus::default());

        let json = serde_json::to_value(BattleStatus {
            turn: Side::B,
            turn_count: 2,
            last_message: Some("hi".into()),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "turn": "B", "turnCount": 2, "lastMessage": "hi" })
        );
    }
}
