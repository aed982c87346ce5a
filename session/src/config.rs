//! Session configuration loaded from TOML.

use std::{fs, io, path::Path, path::PathBuf, time::Duration};

use ghost_defence_system_targeting::{TargetingStrategy, DEFAULT_TARGETING_SEED};
use ghost_defence_world::{Tuning, DEFAULT_DECORATION_PERCENT};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading a [`SessionConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration at {}", path.display())]
    Read {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The file was read but is not valid configuration TOML.
    #[error("failed to parse configuration toml")]
    Parse(#[from] toml::de::Error),
    /// Decoration cannot claim more than every tile.
    #[error("decoration percent {0} exceeds 100")]
    DecorationOutOfRange(u32),
}

/// How defenders choose their targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetingConfig {
    /// Strategy handed to every defender.
    pub strategy: TargetingStrategy,
    /// Seed for the random strategy.
    pub seed: u64,
}

impl Default for TargetingConfig {
    fn default() -> Self {
        Self {
            strategy: TargetingStrategy::default(),
            seed: DEFAULT_TARGETING_SEED,
        }
    }
}

/// Everything needed to build a [`crate::WorldState`] besides the grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Gameplay constants.
    pub tuning: Tuning,
    /// Milliseconds between simulation turns.
    pub cadence_ms: u64,
    /// Target selection.
    pub targeting: TargetingConfig,
    /// Chance, in percent, that an open tile is decorated as blocked at load.
    pub decoration_percent: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tuning: Tuning::default(),
            cadence_ms: 1000,
            targeting: TargetingConfig::default(),
            decoration_percent: DEFAULT_DECORATION_PERCENT,
        }
    }
}

impl SessionConfig {
    /// Parses configuration from TOML text; omitted keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        if config.decoration_percent > 100 {
            return Err(ConfigError::DecorationOutOfRange(config.decoration_percent));
        }
        Ok(config)
    }

    /// Reads and parses the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Delay between simulation turns.
    #[must_use]
    pub fn cadence(&self) -> Duration {
        Duration::from_millis(self.cadence_ms)
    }
}
