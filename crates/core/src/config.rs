/// Arena constants and tunable rule parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ArenaConfig {
    /// Health a creature starts with on its first reconciliation.
    pub initial_health: u32,
    /// Level a creature starts with on its first reconciliation.
    pub initial_level: u32,
    /// Health restored by the `heal` action.
    pub heal_amount: u32,
}

impl ArenaConfig {
    pub const DEFAULT_INITIAL_HEALTH: u32 = 10;
    pub const DEFAULT_INITIAL_LEVEL: u32 = 1;
    pub const DEFAULT_HEAL_AMOUNT: u32 = 10;

    pub const fn new() -> Self {
        Self {
            initial_health: Self::DEFAULT_INITIAL_HEALTH,
            initial_level: Self::DEFAULT_INITIAL_LEVEL,
            heal_amount: Self::DEFAULT_HEAL_AMOUNT,
        }
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new()
    }
}
