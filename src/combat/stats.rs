//! Combat statistics shared by the player and enemies

use serde::{Deserialize, Serialize};

/// HP/attack/defense block for one combatant.
///
/// Mutated only through [`take_damage`](CombatStats::take_damage) and
/// [`heal`](CombatStats::heal), which clamp `hp` to `[0, max_hp]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatStats {
    pub hp: i32,
    pub max_hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub speed: f32,
}

impl Default for CombatStats {
    fn default() -> Self {
        Self {
            hp: 20,
            max_hp: 20,
            attack: 10,
            defense: 10,
            speed: 1.0,
        }
    }
}

impl CombatStats {
    pub fn new(max_hp: i32, attack: i32, defense: i32) -> Self {
        Self {
            hp: max_hp,
            max_hp,
            attack,
            defense,
            speed: 1.0,
        }
    }

    pub fn hp_ratio(&self) -> f32 {
        if self.max_hp > 0 {
            self.hp as f32 / self.max_hp as f32
        } else {
            0.0
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Apply damage. Defense is subtracted (floored at 1) unless
    /// `ignore_defense`. Returns the damage actually taken.
    pub fn take_damage(&mut self, amount: i32, ignore_defense: bool) -> i32 {
        debug_assert!(amount >= 0, "negative damage: {amount}");

        let mut actual = amount.max(0);
        if !ignore_defense {
            actual = (actual - self.defense).max(1);
        }
        actual = actual.min(self.hp);
        self.hp -= actual;
        actual
    }

    /// Restore HP, clamped to `max_hp`. Returns the amount actually healed.
    pub fn heal(&mut self, amount: i32) -> i32 {
        debug_assert!(amount >= 0, "negative heal: {amount}");
        let actual = amount.max(0).min(self.max_hp - self.hp);
        self.hp += actual;
        actual
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_take_damage_applies_defense() {
        let mut stats = CombatStats::new(20, 10, 10);
        let dealt = stats.take_damage(15, false);
        assert_eq!(dealt, 5);
        assert_eq!(stats.hp, 15);
    }

    #[test]
    fn test_take_damage_floors_at_one_through_defense() {
        let mut stats = CombatStats::new(20, 10, 50);
        let dealt = stats.take_damage(3, false);
        assert_eq!(dealt, 1);
        assert_eq!(stats.hp, 19);
    }

    #[test]
    fn test_take_damage_never_overkills() {
        let mut stats = CombatStats::new(20, 10, 0);
        stats.hp = 3;
        let dealt = stats.take_damage(100, true);
        assert_eq!(dealt, 3);
        assert_eq!(stats.hp, 0);
        assert!(!stats.is_alive());
    }

    #[test]
    fn test_heal_clamps_to_max() {
        let mut stats = CombatStats::new(20, 10, 10);
        stats.hp = 15;
        assert_eq!(stats.heal(99), 5);
        assert_eq!(stats.hp, 20);
    }

    proptest! {
        #[test]
        fn prop_hp_stays_in_range(damage in 0i32..10_000, heal in 0i32..10_000) {
            let mut stats = CombatStats::new(20, 10, 10);
            stats.take_damage(damage, false);
            prop_assert!(stats.hp >= 0 && stats.hp <= stats.max_hp);
            stats.heal(heal);
            prop_assert!(stats.hp >= 0 && stats.hp <= stats.max_hp);
        }
    }
}
