//! Gameplay constants that scale economy, waves and mobiles.

use serde::{Deserialize, Serialize};

/// Aggregated tuning knobs for a single game.
///
/// Every field has a default, so partial TOML tables only override what they
/// name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Balance available before the first purchase.
    pub initial_balance: u32,
    /// Lives available before the first escape.
    pub initial_lives: u32,
    /// Mobiles spawned per wave.
    pub mobiles_per_wave: u32,
    /// Wave count that must be cleared to win.
    pub waves_to_win: u32,
    /// Movement budget consumed by a single route step.
    pub movement_threshold: u32,
    /// Movement budget gained per tick before level scaling.
    pub base_speed: u32,
    /// Additional movement budget gained per tick for each mobile level.
    pub speed_per_level: u32,
    /// Starting health granted per mobile level.
    pub health_per_level: u32,
    /// Reward credited for any defeated mobile.
    pub base_reward: u32,
    /// Additional reward credited per mobile level.
    pub reward_per_level: u32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            initial_balance: 100,
            initial_lives: 3,
            mobiles_per_wave: 3,
            waves_to_win: 3,
            movement_threshold: 100,
            base_speed: 70,
            speed_per_level: 10,
            health_per_level: 10,
            base_reward: 30,
            reward_per_level: 10,
        }
    }
}

impl Tuning {
    /// Movement budget gained per tick by a mobile of `level`.
    #[must_use]
    pub fn speed_at(&self, level: u32) -> u32 {
        self.base_speed
            .saturating_add(self.speed_per_level.saturating_mul(level))
    }

    /// Starting health of a mobile of `level`.
    #[must_use]
    pub fn health_at(&self, level: u32) -> u32 {
        self.health_per_level.saturating_mul(level)
    }

    /// Reward credited when a mobile of `level` is defeated.
    #[must_use]
    pub fn reward_at(&self, level: u32) -> u32 {
        self.base_reward
            .saturating_add(self.reward_per_level.saturating_mul(level))
    }
}
