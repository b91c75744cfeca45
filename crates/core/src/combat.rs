//! Damage and healing arithmetic.

/// Apply damage to current health.
///
/// # Returns
///
/// New health value (clamped to 0)
pub fn apply_damage(current_health: u32, damage: u32) -> u32 {
    current_health.saturating_sub(damage)
}

/// Apply healing to current health. There is no upper bound.
pub fn apply_heal(current_health: u32, amount: u32) -> u32 {
    current_health.saturating_add(amount)
}
