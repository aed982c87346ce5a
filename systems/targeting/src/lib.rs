#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Target selection strategies consulted by defenders during combat.

use std::{cmp::Reverse, fmt, str::FromStr};

use ghost_defence_core::{DefenderSnapshot, MobileId, MobileSnapshot, TargetSelector};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Seed used when a configuration does not name one.
pub const DEFAULT_TARGETING_SEED: u64 = 0x6a09_e667_f3bc_c908;

/// Picks uniformly among the mobiles a defender can reach.
///
/// The generator is seeded, so two selectors built from the same seed make the
/// same choices for the same sequence of requests.
#[derive(Debug)]
pub struct RandomTargeting {
    rng: ChaCha8Rng,
    in_range: Vec<MobileId>,
}

impl RandomTargeting {
    /// Creates a selector driven by a generator seeded with `seed`.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            in_range: Vec::new(),
        }
    }
}

impl TargetSelector for RandomTargeting {
    fn select(
        &mut self,
        defender: &DefenderSnapshot,
        candidates: &[MobileSnapshot],
    ) -> Option<MobileId> {
        self.in_range.clear();
        self.in_range.extend(
            candidates
                .iter()
                .filter(|candidate| defender.reaches(candidate.location))
                .map(|candidate| candidate.id),
        );
        if self.in_range.is_empty() {
            return None;
        }

        let pick = self.rng.gen_range(0..self.in_range.len());
        self.in_range.get(pick).copied()
    }
}

/// Prefers the mobile furthest along the route.
#[derive(Debug, Default)]
pub struct NearestToExit;

impl TargetSelector for NearestToExit {
    fn select(
        &mut self,
        defender: &DefenderSnapshot,
        candidates: &[MobileSnapshot],
    ) -> Option<MobileId> {
        best_in_range(defender, candidates, |candidate| {
            (candidate.route_index, Reverse(candidate.id))
        })
    }
}

/// Prefers the mobile with the most health left; ties go to the older mobile.
#[derive(Debug, Default)]
pub struct HighestHealth;

impl TargetSelector for HighestHealth {
    fn select(
        &mut self,
        defender: &DefenderSnapshot,
        candidates: &[MobileSnapshot],
    ) -> Option<MobileId> {
        best_in_range(defender, candidates, |candidate| {
            (candidate.health, Reverse(candidate.id))
        })
    }
}

fn best_in_range<K, F>(
    defender: &DefenderSnapshot,
    candidates: &[MobileSnapshot],
    rank: F,
) -> Option<MobileId>
where
    K: Ord,
    F: Fn(&MobileSnapshot) -> K,
{
    candidates
        .iter()
        .filter(|candidate| defender.reaches(candidate.location))
        .max_by_key(|candidate| rank(candidate))
        .map(|candidate| candidate.id)
}

/// Named targeting strategies that configuration files may select.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetingStrategy {
    /// Uniform random choice among reachable mobiles.
    #[default]
    Random,
    /// Mobile with the highest route index.
    NearestToExit,
    /// Mobile with the most health remaining.
    HighestHealth,
}

impl TargetingStrategy {
    /// Every strategy, in declaration order.
    pub const ALL: [Self; 3] = [Self::Random, Self::NearestToExit, Self::HighestHealth];

    /// Configuration name of the strategy.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::NearestToExit => "nearest_to_exit",
            Self::HighestHealth => "highest_health",
        }
    }
}

impl fmt::Display for TargetingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a strategy name is not recognised.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown targeting strategy `{0}`")]
pub struct UnknownStrategy(pub String);

impl FromStr for TargetingStrategy {
    type Err = UnknownStrategy;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.name() == normalized)
            .ok_or_else(|| UnknownStrategy(value.to_owned()))
    }
}

/// Builds the selector for `strategy`; `seed` only affects random targeting.
#[must_use]
pub fn build(strategy: TargetingStrategy, seed: u64) -> Box<dyn TargetSelector + Send> {
    match strategy {
        TargetingStrategy::Random => Box::new(RandomTargeting::from_seed(seed)),
        TargetingStrategy::NearestToExit => Box::new(NearestToExit),
        TargetingStrategy::HighestHealth => Box::new(HighestHealth),
    }
}
