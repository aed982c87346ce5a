#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Background clock that drives simulation turns at a fixed cadence.

use std::{
    io,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use thiserror::Error;

/// Delay between turns when nothing else is configured.
pub const DEFAULT_CADENCE: Duration = Duration::from_millis(1000);

const WORKER_NAME: &str = "ghost-defence-clock";

/// Decision returned by a step telling the clock whether to keep going.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockControl {
    /// Schedule another step after the cadence elapses.
    Continue,
    /// Finish the worker after this step.
    Stop,
}

/// Errors raised while starting the clock.
#[derive(Debug, Error)]
pub enum ClockError {
    /// The operating system refused to create the worker thread.
    #[error("failed to spawn the simulation clock worker")]
    Spawn(#[source] io::Error),
}

#[derive(Debug, Default)]
struct SignalState {
    stop_requested: bool,
    finished: bool,
}

/// Stop request and completion flag shared with one worker.
#[derive(Debug, Default)]
struct ClockSignal {
    state: Mutex<SignalState>,
    wake: Condvar,
}

impl ClockSignal {
    fn lock(&self) -> MutexGuard<'_, SignalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn request(&self) {
        self.lock().stop_requested = true;
        self.wake.notify_all();
    }

    fn is_requested(&self) -> bool {
        self.lock().stop_requested
    }

    fn finish(&self) {
        self.lock().finished = true;
        self.wake.notify_all();
    }

    fn is_finished(&self) -> bool {
        self.lock().finished
    }

    /// Sleeps for `cadence` unless a stop arrives first. Returns `true` when
    /// the stop was requested.
    fn wait(&self, cadence: Duration) -> bool {
        let deadline = Instant::now() + cadence;
        let mut state = self.lock();
        while !state.stop_requested {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (guard, _) = self
                .wake
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
        state.stop_requested
    }

    fn wait_finished(&self) {
        let mut state = self.lock();
        while !state.finished {
            state = self
                .wake
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Marks the worker finished on every exit path, panics included.
struct FinishOnDrop(Arc<ClockSignal>);

impl Drop for FinishOnDrop {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Handle that blocks until one particular worker has finished.
///
/// Waiting does not borrow the clock, so the clock stays free for
/// [`SimulationClock::request_stop`] while someone waits.
#[derive(Clone, Debug)]
pub struct ClockWaiter {
    signal: Arc<ClockSignal>,
}

impl ClockWaiter {
    /// Blocks until the worker has run its last step.
    pub fn wait(&self) {
        self.signal.wait_finished();
    }
}

/// Runs a step function on a dedicated thread, one step at a time.
///
/// A step already executing when [`SimulationClock::request_stop`] is called
/// runs to completion; only the following wait and step are skipped.
#[derive(Debug)]
pub struct SimulationClock {
    cadence: Duration,
    signal: Arc<ClockSignal>,
    worker: Option<JoinHandle<()>>,
}

impl SimulationClock {
    /// Creates an idle clock that waits `cadence` before every step.
    #[must_use]
    pub fn new(cadence: Duration) -> Self {
        Self {
            cadence,
            signal: Arc::new(ClockSignal::default()),
            worker: None,
        }
    }

    /// Delay applied before each step.
    #[must_use]
    pub const fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Reports whether a worker is still taking steps.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker.is_some() && !self.signal.is_finished()
    }

    /// Returns a waiter for the current worker, if one was started and not
    /// yet joined.
    #[must_use]
    pub fn waiter(&self) -> Option<ClockWaiter> {
        self.worker.as_ref().map(|_| ClockWaiter {
            signal: Arc::clone(&self.signal),
        })
    }

    /// Spawns the worker unless one is already running.
    ///
    /// Returns `Ok(false)` without touching the running worker when the clock
    /// is already active.
    pub fn start<F>(&mut self, mut step: F) -> Result<bool, ClockError>
    where
        F: FnMut() -> ClockControl + Send + 'static,
    {
        if self.is_running() {
            return Ok(false);
        }
        self.join();

        let signal = Arc::new(ClockSignal::default());
        let worker_signal = Arc::clone(&signal);
        let cadence = self.cadence;
        let worker = thread::Builder::new()
            .name(WORKER_NAME.to_owned())
            .spawn(move || {
                let _finished = FinishOnDrop(Arc::clone(&worker_signal));
                let mut steps: u64 = 0;
                loop {
                    if worker_signal.wait(cadence) {
                        break;
                    }
                    steps += 1;
                    tracing::trace!(step = steps, "clock step");
                    if step() == ClockControl::Stop {
                        break;
                    }
                }
                tracing::debug!(steps, "simulation clock finished");
            })
            .map_err(ClockError::Spawn)?;

        tracing::debug!(cadence_ms = cadence.as_millis(), "simulation clock started");
        self.signal = signal;
        self.worker = Some(worker);
        Ok(true)
    }

    /// Asks the worker to finish; wakes it if it is waiting.
    pub fn request_stop(&self) {
        if !self.signal.is_requested() {
            tracing::debug!("simulation clock stop requested");
        }
        self.signal.request();
    }

    /// Blocks until the worker thread has exited.
    pub fn join(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        if worker.join().is_err() {
            tracing::warn!("simulation clock worker panicked");
        }
    }
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new(DEFAULT_CADENCE)
    }
}

impl Drop for SimulationClock {
    fn drop(&mut self) {
        self.request_stop();
        self.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_returns_early_once_stop_is_requested() {
        let signal = ClockSignal::default();
        signal.request();

        let started = Instant::now();
        assert!(signal.wait(Duration::from_secs(30)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn wait_times_out_without_a_stop() {
        let signal = ClockSignal::default();
        assert!(!signal.wait(Duration::from_millis(5)));
    }

    #[test]
    fn finish_releases_every_waiter() {
        let signal = Arc::new(ClockSignal::default());
        let waiter = ClockWaiter {
            signal: Arc::clone(&signal),
        };
        let handle = thread::spawn(move || waiter.wait());

        signal.finish();
        handle.join().expect("waiter thread");
        assert!(signal.is_finished());
        assert!(!signal.is_requested());
    }

    #[test]
    fn idle_clock_is_not_running() {
        let mut clock = SimulationClock::default();
        assert!(!clock.is_running());
        assert!(clock.waiter().is_none());
        assert_eq!(clock.cadence(), DEFAULT_CADENCE);
        clock.request_stop();
        clock.join();
    }
}
