#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Ghost Defence engine.
//!
//! This crate defines the message surface that connects the command shell,
//! the authoritative world, and pure systems. Callers submit [`Command`]
//! values describing desired mutations, the world executes them through its
//! `apply` entry point and answers with either a [`Rejection`] or a batch of
//! [`Event`] values. Presentation layers never touch world internals; they read
//! [`WorldSnapshot`] projections instead.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Location of a single grid tile expressed as row and column indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridLocation {
    row: u32,
    column: u32,
}

impl GridLocation {
    /// Creates a new grid location.
    #[must_use]
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// Zero-based row index of the tile.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Zero-based column index of the tile.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Computes the Manhattan distance between two locations.
    #[must_use]
    pub fn manhattan_distance(self, other: GridLocation) -> u32 {
        self.row.abs_diff(other.row) + self.column.abs_diff(other.column)
    }

    /// Reports whether the two locations share an edge.
    #[must_use]
    pub fn is_adjacent(self, other: GridLocation) -> bool {
        self.manhattan_distance(other) == 1
    }

    /// Yields the in-bounds cardinal neighbours in traversal priority order:
    /// right, down, up, left.
    pub fn neighbors(self, rows: u32, columns: u32) -> impl Iterator<Item = GridLocation> {
        let mut candidates = [None; 4];
        let mut count = 0;

        if let Some(column) = self.column.checked_add(1) {
            if column < columns {
                candidates[count] = Some(GridLocation::new(self.row, column));
                count += 1;
            }
        }

        if let Some(row) = self.row.checked_add(1) {
            if row < rows {
                candidates[count] = Some(GridLocation::new(row, self.column));
                count += 1;
            }
        }

        if let Some(row) = self.row.checked_sub(1) {
            candidates[count] = Some(GridLocation::new(row, self.column));
            count += 1;
        }

        if let Some(column) = self.column.checked_sub(1) {
            candidates[count] = Some(GridLocation::new(self.row, column));
            count += 1;
        }

        candidates.into_iter().take(count).flatten()
    }
}

impl fmt::Display for GridLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}

/// Kinds of tiles a grid may contain, in grid-file code order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    /// Open ground where defenders may be built.
    OpenBuildable,
    /// Decorative obstacle; neither walkable nor buildable.
    Blocked,
    /// Corridor tile walked by mobiles.
    Road,
    /// The single tile where mobiles enter the grid.
    Entry,
    /// The single tile mobiles leave the grid from.
    Exit,
    /// Void tile outside the playable area.
    Empty,
}

impl TileKind {
    /// Every tile kind ordered by its grid-file code.
    pub const ALL: [TileKind; 6] = [
        Self::OpenBuildable,
        Self::Blocked,
        Self::Road,
        Self::Entry,
        Self::Exit,
        Self::Empty,
    ];

    /// Resolves a grid-file code into a tile kind.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    /// Grid-file code of the tile kind.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::OpenBuildable => 0,
            Self::Blocked => 1,
            Self::Road => 2,
            Self::Entry => 3,
            Self::Exit => 4,
            Self::Empty => 5,
        }
    }

    /// Reports whether mobiles may walk over the tile.
    #[must_use]
    pub const fn is_traversable(self) -> bool {
        matches!(self, Self::Road | Self::Entry | Self::Exit)
    }
}

/// Unique identifier assigned to a mobile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MobileId(u32);

impl MobileId {
    /// Creates a new mobile identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a defender.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DefenderId(u32);

impl DefenderId {
    /// Creates a new defender identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the defender identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Types of defenders that can be constructed on open ground.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefenderKind {
    /// Balanced defender with medium cost and range.
    Basic,
    /// Cheap short-ranged defender.
    Slowing,
    /// Expensive defender whose hits spill onto neighbouring mobiles.
    Splash,
}

/// Percentage of a defender's total investment returned when it is sold.
pub const REFUND_PERCENT: u32 = 40;

impl DefenderKind {
    /// Every defender kind available for purchase.
    pub const ALL: [DefenderKind; 3] = [Self::Basic, Self::Slowing, Self::Splash];

    /// Price paid to place a level one defender.
    #[must_use]
    pub const fn base_cost(self) -> u32 {
        match self {
            Self::Basic => 10,
            Self::Slowing => 5,
            Self::Splash => 20,
        }
    }

    /// Price of each upgrade, also counted per level when refunding.
    #[must_use]
    pub const fn level_cost(self) -> u32 {
        match self {
            Self::Basic => 8,
            Self::Slowing => 4,
            Self::Splash => 15,
        }
    }

    /// Damage dealt per attack at level one.
    #[must_use]
    pub const fn base_power(self) -> u32 {
        match self {
            Self::Basic => 2,
            Self::Slowing => 1,
            Self::Splash => 4,
        }
    }

    /// Manhattan reach at level one.
    #[must_use]
    pub const fn base_range(self) -> u32 {
        match self {
            Self::Basic => 5,
            Self::Slowing => 3,
            Self::Splash => 8,
        }
    }

    /// Rate of fire at level one.
    #[must_use]
    pub const fn base_rate_of_fire(self) -> u32 {
        1
    }

    /// Divisor applied to power for damage spilled onto mobiles adjacent to
    /// the primary target, if the kind splashes at all.
    #[must_use]
    pub const fn splash_divisor(self) -> Option<u32> {
        match self {
            Self::Splash => Some(4),
            Self::Basic | Self::Slowing => None,
        }
    }

    /// Statistics of a defender of this kind at the provided level.
    ///
    /// Power, range and rate of fire double with every level above one and
    /// saturate instead of overflowing.
    #[must_use]
    pub fn stats_at(self, level: u32) -> DefenderStats {
        let factor = 2_u32.saturating_pow(level.saturating_sub(1));
        DefenderStats {
            power: self.base_power().saturating_mul(factor),
            range: self.base_range().saturating_mul(factor),
            rate_of_fire: self.base_rate_of_fire().saturating_mul(factor),
            upgrade_cost: self.level_cost(),
            refund: self.refund_at(level),
        }
    }

    /// Amount credited when selling a defender of this kind at `level`.
    ///
    /// Computes `floor((base_cost + level * level_cost) * 0.4)` in integers.
    #[must_use]
    pub fn refund_at(self, level: u32) -> u32 {
        let total = u64::from(self.base_cost()) + u64::from(level) * u64::from(self.level_cost());
        let refund = total * u64::from(REFUND_PERCENT) / 100;
        u32::try_from(refund).unwrap_or(u32::MAX)
    }

    /// Lower-case name used by command shells.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Slowing => "slowing",
            Self::Splash => "splash",
        }
    }
}

impl fmt::Display for DefenderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown defender kind name.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown defender kind `{0}`; expected basic, slowing or splash")]
pub struct UnknownDefenderKind(pub String);

impl FromStr for DefenderKind {
    type Err = UnknownDefenderKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| UnknownDefenderKind(value.to_owned()))
    }
}

/// Level-dependent statistics of a defender.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefenderStats {
    /// Damage dealt to the primary target per attack.
    pub power: u32,
    /// Maximum Manhattan distance to a target.
    pub range: u32,
    /// Reported rate of fire; every defender attacks at most once per tick.
    pub rate_of_fire: u32,
    /// Price of the next upgrade.
    pub upgrade_cost: u32,
    /// Amount credited if the defender were sold now.
    pub refund: u32,
}

/// Gameplay phase of the wave simulator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WavePhase {
    /// No wave is running; the player may prepare.
    Idle,
    /// A wave is spawning and advancing.
    WaveActive,
    /// Lives reached zero. Terminal.
    GameLost,
    /// The final wave was cleared. Terminal.
    GameWon,
}

impl WavePhase {
    /// Reports whether the phase ends the game.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::GameLost | Self::GameWon)
    }
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Purchases a defender of the given kind on the provided tile.
    BuyDefender {
        /// Type of defender to construct.
        kind: DefenderKind,
        /// Tile the defender should occupy.
        location: GridLocation,
    },
    /// Sells the defender standing on the provided tile.
    SellDefender {
        /// Tile holding the defender to sell.
        location: GridLocation,
    },
    /// Raises the level of the defender standing on the provided tile.
    UpgradeDefender {
        /// Tile holding the defender to upgrade.
        location: GridLocation,
    },
    /// Begins the next wave.
    StartWave,
    /// Abandons the active wave, withdrawing its mobiles without reward.
    ///
    /// The wave number is kept so the same wave can be started again.
    CancelWave,
    /// Advances the active wave by a single turn.
    Tick,
}

/// Recoverable reasons a command may be refused by the world.
///
/// A rejected command never mutates state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum Rejection {
    /// The balance does not cover the price.
    #[error("insufficient funds: {required} required, {available} available")]
    InsufficientFunds {
        /// Price of the requested action.
        required: u32,
        /// Balance at the time of the request.
        available: u32,
    },
    /// The tile is outside the grid, not open ground, on the route or occupied.
    #[error("tile {location} is not buildable")]
    NotBuildable {
        /// Tile named by the request.
        location: GridLocation,
    },
    /// No defender stands on the tile.
    #[error("no defender at {location}")]
    NoDefender {
        /// Tile named by the request.
        location: GridLocation,
    },
    /// A wave is already running.
    #[error("wave already active")]
    WaveAlreadyActive,
    /// A tick was requested while no wave is running.
    #[error("no wave is active")]
    NoActiveWave,
    /// The game has been won or lost.
    #[error("the game is over")]
    GameOver,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Event {
    /// Confirms that a defender was purchased and placed.
    DefenderPurchased {
        /// Identifier allocated to the defender.
        defender: DefenderId,
        /// Type of defender that was placed.
        kind: DefenderKind,
        /// Tile the defender occupies.
        location: GridLocation,
        /// Amount debited from the balance.
        cost: u32,
    },
    /// Confirms that a defender was sold.
    DefenderSold {
        /// Identifier of the sold defender.
        defender: DefenderId,
        /// Tile that was freed.
        location: GridLocation,
        /// Amount credited to the balance.
        refund: u32,
    },
    /// Confirms that a defender gained a level.
    DefenderUpgraded {
        /// Identifier of the upgraded defender.
        defender: DefenderId,
        /// Level reached after the upgrade.
        level: u32,
        /// Amount debited from the balance.
        cost: u32,
    },
    /// Announces that a wave began.
    WaveStarted {
        /// Number of the wave that began.
        wave: u32,
    },
    /// Indicates that the simulation advanced a turn.
    TimeAdvanced {
        /// Index of the turn, counted from one across the whole game.
        tick: u64,
    },
    /// Confirms that a mobile entered the grid.
    MobileSpawned {
        /// Identifier assigned to the new mobile.
        mobile: MobileId,
        /// Entry tile the mobile occupies.
        location: GridLocation,
        /// Level of the mobile.
        level: u32,
        /// Starting health of the mobile.
        health: u32,
    },
    /// Confirms that a mobile stepped along the route.
    MobileAdvanced {
        /// Identifier of the mobile that moved.
        mobile: MobileId,
        /// Tile the mobile left.
        from: GridLocation,
        /// Tile the mobile entered.
        to: GridLocation,
    },
    /// Reports that a mobile walked out through the exit.
    MobileEscaped {
        /// Identifier of the escaped mobile.
        mobile: MobileId,
        /// Lives left after the escape.
        lives_remaining: u32,
    },
    /// Reports damage dealt to a mobile.
    MobileDamaged {
        /// Identifier of the damaged mobile.
        mobile: MobileId,
        /// Defender responsible for the damage.
        defender: DefenderId,
        /// Damage applied.
        damage: u32,
        /// Health left after the damage.
        remaining: u32,
    },
    /// Reports that a mobile was removed after its health ran out.
    MobileDefeated {
        /// Identifier of the defeated mobile.
        mobile: MobileId,
        /// Amount credited to the balance.
        reward: u32,
    },
    /// Announces that every mobile of a wave was resolved.
    WaveCompleted {
        /// Number of the wave that finished.
        wave: u32,
    },
    /// Announces that the active wave was abandoned before it finished.
    WaveCancelled {
        /// Number of the wave that was abandoned.
        wave: u32,
        /// Mobiles removed from the route without reward.
        withdrawn: u32,
    },
    /// Announces that lives ran out.
    GameLost,
    /// Announces that the final wave was cleared.
    GameWon,
}

/// Immutable representation of a single mobile's state used for queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobileSnapshot {
    /// Unique identifier assigned to the mobile.
    pub id: MobileId,
    /// Tile currently occupied by the mobile.
    pub location: GridLocation,
    /// Position of the tile along the route, zero at the entry.
    pub route_index: usize,
    /// Remaining health.
    pub health: u32,
    /// Level driving health, speed and reward.
    pub level: u32,
    /// Movement budget accumulated toward the next step.
    pub movement: u32,
}

/// Immutable representation of a single defender's state used for queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefenderSnapshot {
    /// Identifier allocated to the defender by the world.
    pub id: DefenderId,
    /// Kind of defender that was constructed.
    pub kind: DefenderKind,
    /// Tile the defender occupies.
    pub location: GridLocation,
    /// Current level.
    pub level: u32,
    /// Statistics derived from kind and level.
    pub stats: DefenderStats,
}

impl DefenderSnapshot {
    /// Reports whether a target standing on `location` is within range.
    #[must_use]
    pub fn reaches(&self, location: GridLocation) -> bool {
        self.location.manhattan_distance(location) <= self.stats.range
    }
}

/// A single attack performed during the most recent turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRecord {
    /// Defender that attacked.
    pub defender: DefenderId,
    /// Mobile chosen as the primary target.
    pub target: MobileId,
    /// Tile the target occupied when hit.
    pub location: GridLocation,
}

/// Read-only projection of the whole world for presentation layers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Spendable balance.
    pub balance: u32,
    /// Lives remaining.
    pub lives: u32,
    /// Current wave number, starting at one.
    pub wave: u32,
    /// Phase of the wave simulator.
    pub phase: WavePhase,
    /// Turns simulated since the game began.
    pub tick: u64,
    /// Mobiles spawned during the current wave.
    pub spawned: u32,
    /// Mobiles defeated since the game began.
    pub defeated: u32,
    /// Defenders ordered by identifier.
    pub defenders: Vec<DefenderSnapshot>,
    /// Mobiles ordered by route position, head of the route first.
    pub mobiles: Vec<MobileSnapshot>,
    /// Attacks performed during the most recent turn.
    pub last_attacks: Vec<AttackRecord>,
}

/// Chooses which mobile a defender attacks.
///
/// Candidates are the live mobiles in route order. Implementations must only
/// return identifiers of candidates the defender [reaches](DefenderSnapshot::reaches).
pub trait TargetSelector: fmt::Debug {
    /// Selects a target among `candidates`, or `None` if none is in range.
    fn select(
        &mut self,
        defender: &DefenderSnapshot,
        candidates: &[MobileSnapshot],
    ) -> Option<MobileId>;
}
