#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Ghost Defence.

mod defenders;
mod grid;
mod mobiles;
mod tuning;
mod wave;

use ghost_defence_core::{
    Command, DefenderKind, Event, GridLocation, Rejection, TargetSelector, WavePhase,
};

pub use grid::{
    DisconnectedGridError, GridError, GridFormatError, GridTopology, DEFAULT_DECORATION_PERCENT,
};
pub use tuning::Tuning;

use crate::{
    defenders::DefenderRegistry,
    mobiles::MobileRoster,
    wave::{Battlefield, WaveSimulator},
};

/// Represents the authoritative Ghost Defence world state.
#[derive(Debug)]
pub struct World {
    topology: GridTopology,
    tuning: Tuning,
    defenders: DefenderRegistry,
    mobiles: MobileRoster,
    simulator: WaveSimulator,
    selector: Box<dyn TargetSelector + Send>,
    balance: u32,
    lives: u32,
}

impl World {
    /// Creates an idle world on the provided topology.
    #[must_use]
    pub fn new(
        topology: GridTopology,
        tuning: Tuning,
        selector: Box<dyn TargetSelector + Send>,
    ) -> Self {
        Self {
            balance: tuning.initial_balance,
            lives: tuning.initial_lives,
            topology,
            tuning,
            defenders: DefenderRegistry::new(),
            mobiles: MobileRoster::new(),
            simulator: WaveSimulator::new(),
            selector,
        }
    }

    fn buy_defender(
        &mut self,
        kind: DefenderKind,
        location: GridLocation,
        out_events: &mut Vec<Event>,
    ) -> Result<(), Rejection> {
        if !query::is_buildable(self, location) {
            return Err(Rejection::NotBuildable { location });
        }
        let cost = kind.base_cost();
        self.charge(cost)?;

        let defender = self.defenders.place(kind, location);
        tracing::debug!(
            defender = defender.get(),
            %kind,
            %location,
            balance = self.balance,
            "defender purchased"
        );
        out_events.push(Event::DefenderPurchased {
            defender,
            kind,
            location,
            cost,
        });
        Ok(())
    }

    fn sell_defender(
        &mut self,
        location: GridLocation,
        out_events: &mut Vec<Event>,
    ) -> Result<(), Rejection> {
        let defender = self
            .defenders
            .remove(location)
            .ok_or(Rejection::NoDefender { location })?;
        let refund = defender.kind.refund_at(defender.level);
        self.balance = self.balance.saturating_add(refund);

        tracing::debug!(
            defender = defender.id.get(),
            %location,
            refund,
            "defender sold"
        );
        out_events.push(Event::DefenderSold {
            defender: defender.id,
            location,
            refund,
        });
        Ok(())
    }

    fn upgrade_defender(
        &mut self,
        location: GridLocation,
        out_events: &mut Vec<Event>,
    ) -> Result<(), Rejection> {
        let cost = self
            .defenders
            .at(location)
            .map(|defender| defender.kind.level_cost())
            .ok_or(Rejection::NoDefender { location })?;
        self.charge(cost)?;

        let Some(defender) = self.defenders.at_mut(location) else {
            return Err(Rejection::NoDefender { location });
        };
        defender.level = defender.level.saturating_add(1);

        tracing::debug!(
            defender = defender.id.get(),
            level = defender.level,
            "defender upgraded"
        );
        out_events.push(Event::DefenderUpgraded {
            defender: defender.id,
            level: defender.level,
            cost,
        });
        Ok(())
    }

    fn start_wave(&mut self, out_events: &mut Vec<Event>) -> Result<(), Rejection> {
        if self.simulator.phase() == WavePhase::WaveActive {
            return Err(Rejection::WaveAlreadyActive);
        }
        self.simulator.begin_wave(out_events);
        tracing::info!(wave = self.simulator.wave(), "wave started");
        Ok(())
    }

    fn cancel_wave(&mut self, out_events: &mut Vec<Event>) -> Result<(), Rejection> {
        if self.simulator.phase() != WavePhase::WaveActive {
            return Err(Rejection::NoActiveWave);
        }
        self.simulator.cancel_wave(&mut self.mobiles, out_events);
        tracing::info!(wave = self.simulator.wave(), "wave cancelled");
        Ok(())
    }

    fn tick(&mut self, out_events: &mut Vec<Event>) -> Result<(), Rejection> {
        if self.simulator.phase() != WavePhase::WaveActive {
            return Err(Rejection::NoActiveWave);
        }
        let field = Battlefield {
            topology: &self.topology,
            tuning: &self.tuning,
            defenders: &self.defenders,
            mobiles: &mut self.mobiles,
            selector: self.selector.as_mut(),
            balance: &mut self.balance,
            lives: &mut self.lives,
        };
        self.simulator.tick(field, out_events);
        Ok(())
    }

    fn charge(&mut self, cost: u32) -> Result<(), Rejection> {
        if self.balance < cost {
            return Err(Rejection::InsufficientFunds {
                required: cost,
                available: self.balance,
            });
        }
        self.balance -= cost;
        Ok(())
    }
}

/// Applies the provided command to the world, mutating state deterministically.
///
/// A rejected command leaves the world untouched and emits no events.
pub fn apply(
    world: &mut World,
    command: Command,
    out_events: &mut Vec<Event>,
) -> Result<(), Rejection> {
    if world.simulator.phase().is_terminal() {
        return Err(Rejection::GameOver);
    }

    match command {
        Command::BuyDefender { kind, location } => world.buy_defender(kind, location, out_events),
        Command::SellDefender { location } => world.sell_defender(location, out_events),
        Command::UpgradeDefender { location } => world.upgrade_defender(location, out_events),
        Command::StartWave => world.start_wave(out_events),
        Command::CancelWave => world.cancel_wave(out_events),
        Command::Tick => world.tick(out_events),
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use ghost_defence_core::{GridLocation, WavePhase, WorldSnapshot};

    use super::{GridTopology, Tuning, World};

    /// Captures a consistent copy of everything a presentation layer draws.
    #[must_use]
    pub fn snapshot(world: &World) -> WorldSnapshot {
        WorldSnapshot {
            balance: world.balance,
            lives: world.lives,
            wave: world.simulator.wave(),
            phase: world.simulator.phase(),
            tick: world.simulator.tick_index(),
            spawned: world.simulator.spawned(),
            defeated: world.simulator.defeated(),
            defenders: world.defenders.snapshots(),
            mobiles: world.mobiles.snapshots(),
            last_attacks: world.simulator.last_attacks().to_vec(),
        }
    }

    /// Reports whether a defender may be purchased on `location`.
    #[must_use]
    pub fn is_buildable(world: &World, location: GridLocation) -> bool {
        world
            .topology
            .is_buildable_with(location, |candidate| world.defenders.is_occupied(candidate))
    }

    /// Topology the world was built on.
    #[must_use]
    pub fn topology(world: &World) -> &GridTopology {
        &world.topology
    }

    /// Tuning the world was built with.
    #[must_use]
    pub fn tuning(world: &World) -> &Tuning {
        &world.tuning
    }

    /// Current phase of the wave simulator.
    #[must_use]
    pub fn phase(world: &World) -> WavePhase {
        world.simulator.phase()
    }

    /// Spendable balance.
    #[must_use]
    pub fn balance(world: &World) -> u32 {
        world.balance
    }

    /// Lives remaining.
    #[must_use]
    pub fn lives(world: &World) -> u32 {
        world.lives
    }
}
