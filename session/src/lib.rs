#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared command surface that serialises player commands with clock ticks.
//!
//! A [`WorldState`] owns the world behind a single lock. Foreground commands
//! and background turns both go through that lock, so a command is applied
//! either entirely before or entirely after a turn.

mod config;

use std::{
    sync::{mpsc, Arc, Mutex, MutexGuard, Weak},
    time::Duration,
};

use ghost_defence_core::{
    Command, DefenderKind, Event, GridLocation, Rejection, WavePhase, WorldSnapshot,
};
use ghost_defence_system_clock::{ClockControl, ClockError, SimulationClock};
use ghost_defence_world::{self as world, query, GridTopology, World};
use thiserror::Error;

pub use config::{ConfigError, SessionConfig, TargetingConfig};

/// Notification sent after every successful mutation and every turn.
///
/// It carries no data; listeners re-read through [`WorldState::query_state`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateChanged;

/// Failures of [`WorldState::start_wave`].
#[derive(Debug, Error)]
pub enum SessionError {
    /// The world refused the command.
    #[error(transparent)]
    Rejected(#[from] Rejection),
    /// The clock could not be spawned; the wave was withdrawn again.
    #[error(transparent)]
    Clock(#[from] ClockError),
}

type Listener = Box<dyn FnMut(StateChanged) + Send>;

struct Shared {
    world: Mutex<World>,
    listeners: Mutex<Vec<Listener>>,
}

impl Shared {
    fn lock_world(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("world lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn apply(&self, command: Command) -> Result<Vec<Event>, Rejection> {
        let mut events = Vec::new();
        let result = {
            let mut world = self.lock_world();
            world::apply(&mut world, command, &mut events)
        };
        if let Err(rejection) = result {
            tracing::debug!(?command, %rejection, "command rejected");
            return Err(rejection);
        }
        Ok(events)
    }

    fn notify(&self) {
        let mut listeners = self.listeners.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("listener lock poisoned, recovering");
            poisoned.into_inner()
        });
        for listener in listeners.iter_mut() {
            listener(StateChanged);
        }
    }
}

/// Runs one turn on behalf of the clock.
fn clock_step(shared: &Weak<Shared>) -> ClockControl {
    let Some(shared) = shared.upgrade() else {
        return ClockControl::Stop;
    };
    let events = match shared.apply(Command::Tick) {
        Ok(events) => events,
        Err(_) => return ClockControl::Stop,
    };
    shared.notify();

    let wave_over = events.iter().any(|event| {
        matches!(
            event,
            Event::WaveCompleted { .. } | Event::GameLost | Event::GameWon
        )
    });
    if wave_over {
        ClockControl::Stop
    } else {
        ClockControl::Continue
    }
}

/// The single application context shared by the command shell and the clock.
pub struct WorldState {
    shared: Arc<Shared>,
    clock: Mutex<SimulationClock>,
    topology: GridTopology,
}

impl WorldState {
    /// Wraps an existing world; turns run every `cadence` while a wave is active.
    #[must_use]
    pub fn new(world: World, cadence: Duration) -> Self {
        let topology = query::topology(&world).clone();
        Self {
            shared: Arc::new(Shared {
                world: Mutex::new(world),
                listeners: Mutex::new(Vec::new()),
            }),
            clock: Mutex::new(SimulationClock::new(cadence)),
            topology,
        }
    }

    /// Builds a fresh world on `topology` using the configured tuning and
    /// targeting.
    #[must_use]
    pub fn from_config(topology: GridTopology, config: &SessionConfig) -> Self {
        let selector =
            ghost_defence_system_targeting::build(config.targeting.strategy, config.targeting.seed);
        let world = World::new(topology, config.tuning.clone(), selector);
        Self::new(world, config.cadence())
    }

    fn lock_clock(&self) -> MutexGuard<'_, SimulationClock> {
        self.clock.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("clock lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn execute(&self, command: Command) -> Result<(), Rejection> {
        let _ = self.shared.apply(command)?;
        self.shared.notify();
        Ok(())
    }

    /// Buys a level one defender of `kind` on `location`.
    pub fn buy_defender(&self, kind: DefenderKind, location: GridLocation) -> Result<(), Rejection> {
        self.execute(Command::BuyDefender { kind, location })
    }

    /// Sells the defender on `location` for its refund.
    pub fn sell_defender(&self, location: GridLocation) -> Result<(), Rejection> {
        self.execute(Command::SellDefender { location })
    }

    /// Raises the level of the defender on `location`.
    pub fn upgrade_defender(&self, location: GridLocation) -> Result<(), Rejection> {
        self.execute(Command::UpgradeDefender { location })
    }

    /// Starts the next wave and the clock that drives it.
    ///
    /// Fails with [`Rejection::WaveAlreadyActive`] while a wave runs, so at
    /// most one clock exists per state. When the clock cannot be spawned the
    /// wave is withdrawn and the world is left as it was.
    pub fn start_wave(&self) -> Result<(), SessionError> {
        self.launch_wave(|clock, shared| clock.start(move || clock_step(&shared)))
    }

    fn launch_wave<S>(&self, spawn: S) -> Result<(), SessionError>
    where
        S: FnOnce(&mut SimulationClock, Weak<Shared>) -> Result<bool, ClockError>,
    {
        let mut clock = self.lock_clock();

        // A worker whose final turn just ended the previous wave is already on
        // its way out.
        if clock.is_running() && query::phase(&self.shared.lock_world()) != WavePhase::WaveActive {
            clock.join();
        }

        let _ = self.shared.apply(Command::StartWave)?;
        let started = match spawn(&mut *clock, Arc::downgrade(&self.shared)) {
            Ok(started) => started,
            Err(error) => {
                tracing::warn!(%error, "wave clock failed to start, withdrawing the wave");
                let _ = self.shared.apply(Command::CancelWave);
                return Err(error.into());
            }
        };
        tracing::debug!(started, "wave clock requested");
        drop(clock);

        self.shared.notify();
        Ok(())
    }

    /// Stops the clock and abandons the active wave, if any.
    ///
    /// The wave's mobiles are withdrawn without reward; the same wave can be
    /// started again afterwards.
    pub fn cancel_wave(&self) -> Result<(), Rejection> {
        let mut clock = self.lock_clock();
        clock.request_stop();
        clock.join();
        let cancelled = self.shared.apply(Command::CancelWave);
        drop(clock);

        let _ = cancelled?;
        self.shared.notify();
        Ok(())
    }

    /// Read-only projection of the current world.
    #[must_use]
    pub fn query_state(&self) -> WorldSnapshot {
        query::snapshot(&self.shared.lock_world())
    }

    /// Reports whether a defender may be bought on `location` right now.
    #[must_use]
    pub fn is_buildable(&self, location: GridLocation) -> bool {
        query::is_buildable(&self.shared.lock_world(), location)
    }

    /// Grid the session plays on.
    #[must_use]
    pub fn topology(&self) -> &GridTopology {
        &self.topology
    }

    /// Registers a callback invoked after every change, outside the world lock.
    ///
    /// Callbacks may run on the clock thread and must not register further
    /// listeners.
    pub fn on_change<F>(&self, listener: F)
    where
        F: FnMut(StateChanged) + Send + 'static,
    {
        let mut listeners = self.shared.listeners.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("listener lock poisoned, recovering");
            poisoned.into_inner()
        });
        listeners.push(Box::new(listener));
    }

    /// Returns a channel that receives a [`StateChanged`] per change.
    pub fn subscribe(&self) -> mpsc::Receiver<StateChanged> {
        let (sender, receiver) = mpsc::channel();
        self.on_change(move |change| {
            let _ = sender.send(change);
        });
        receiver
    }

    /// Reports whether the clock is currently driving a wave.
    #[must_use]
    pub fn is_clock_running(&self) -> bool {
        self.lock_clock().is_running()
    }

    /// Blocks until the active wave, if any, has ended or been stopped.
    ///
    /// The clock stays available to [`WorldState::stop`] while this waits.
    pub fn wait_for_wave(&self) {
        let waiter = self.lock_clock().waiter();
        let Some(waiter) = waiter else {
            return;
        };
        waiter.wait();

        let mut clock = self.lock_clock();
        if !clock.is_running() {
            clock.join();
        }
    }

    /// Stops the clock after its current turn, waits for it and abandons any
    /// wave it left unfinished.
    pub fn stop(&self) {
        if self.cancel_wave().is_ok() {
            tracing::info!("active wave abandoned on stop");
        }
    }
}

impl Drop for WorldState {
    fn drop(&mut self) {
        self.stop();
    }
}
