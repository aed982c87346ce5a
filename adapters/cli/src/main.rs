#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that drives a Ghost Defence session from stdin.

mod output;
mod shell;

use std::{
    fs,
    io::{self, BufRead},
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Weak},
    thread,
};

use anyhow::{Context, Result};
use clap::Parser;
use ghost_defence_core::WavePhase;
use ghost_defence_session::{SessionConfig, SessionError, StateChanged, WorldState};
use ghost_defence_system_targeting::TargetingStrategy;
use ghost_defence_world::GridTopology;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::{
    output::{Output, Reply},
    shell::{ShellCommand, HELP},
};

#[derive(Parser, Debug)]
#[command(
    name = "ghost-defence",
    version,
    about = "Turn-based ghost defence played from the command line"
)]
struct Args {
    /// Grid file: a `rows columns` header followed by one row of tile codes per line
    #[arg(long)]
    grid: PathBuf,
    /// TOML session configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Sprinkle decorative blocked tiles over open ground at load time
    #[arg(long)]
    decorate: bool,
    /// Seed for random targeting and decoration
    #[arg(long)]
    seed: Option<u64>,
    /// Milliseconds between simulation turns
    #[arg(long)]
    cadence_ms: Option<u64>,
    /// Target selection strategy (random, nearest_to_exit, highest_health)
    #[arg(long)]
    strategy: Option<TargetingStrategy>,
    /// Emit one JSON object per reply instead of text
    #[arg(long)]
    json: bool,
}

/// Entry point for the Ghost Defence command-line interface.
fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    run(&args)
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(io::stderr)
            .compact()
            .init();
    }
}

fn run(args: &Args) -> Result<()> {
    let config = load_config(args)?;
    let topology = load_grid(&args.grid, args.decorate, &config)?;
    tracing::info!(
        rows = topology.rows(),
        columns = topology.columns(),
        route = topology.route().len(),
        strategy = %config.targeting.strategy,
        "grid loaded"
    );

    let output = Output::new(args.json);
    let state = Arc::new(WorldState::from_config(topology, &config));
    spawn_progress(Arc::downgrade(&state), state.subscribe(), output)?;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read command from stdin")?;
        let command = match shell::parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(error) => {
                output.emit(&Reply::Error {
                    message: error.to_string(),
                })?;
                continue;
            }
        };
        if command == ShellCommand::Quit {
            break;
        }
        execute(&state, command, output)?;
    }

    state.stop();
    Ok(())
}

fn load_config(args: &Args) -> Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("failed to load session config {}", path.display()))?,
        None => SessionConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.targeting.seed = seed;
    }
    if let Some(cadence_ms) = args.cadence_ms {
        config.cadence_ms = cadence_ms;
    }
    if let Some(strategy) = args.strategy {
        config.targeting.strategy = strategy;
    }
    Ok(config)
}

fn load_grid(path: &Path, decorate: bool, config: &SessionConfig) -> Result<GridTopology> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read grid file {}", path.display()))?;
    let topology = if decorate {
        let mut rng = ChaCha8Rng::seed_from_u64(config.targeting.seed);
        GridTopology::parse_with(&contents, &mut rng, config.decoration_percent)
    } else {
        GridTopology::parse(&contents)
    };
    topology.with_context(|| format!("invalid grid file {}", path.display()))
}

fn execute(state: &WorldState, command: ShellCommand, output: Output) -> Result<()> {
    let result = match command {
        ShellCommand::Buy { kind, location } => state
            .buy_defender(kind, location)
            .map(|()| format!("bought {kind} at {location}")),
        ShellCommand::Sell { location } => state
            .sell_defender(location)
            .map(|()| format!("sold defender at {location}")),
        ShellCommand::Upgrade { location } => state
            .upgrade_defender(location)
            .map(|()| format!("upgraded defender at {location}")),
        ShellCommand::StartWave => match state.start_wave() {
            Ok(()) => Ok(format!("wave {} started", state.query_state().wave)),
            Err(SessionError::Rejected(rejection)) => Err(rejection),
            Err(error @ SessionError::Clock(_)) => {
                return Err(error).context("failed to start the wave clock");
            }
        },
        ShellCommand::Cancel => state
            .cancel_wave()
            .map(|()| format!("wave {} abandoned", state.query_state().wave)),
        ShellCommand::Wait => {
            state.wait_for_wave();
            let snapshot = state.query_state();
            return output.emit(&Reply::State {
                snapshot: &snapshot,
            });
        }
        ShellCommand::State => {
            let snapshot = state.query_state();
            return output.emit(&Reply::State {
                snapshot: &snapshot,
            });
        }
        ShellCommand::Map => {
            let snapshot = state.query_state();
            return output.emit(&Reply::Map {
                rows: output::map_rows(state.topology(), &snapshot),
            });
        }
        ShellCommand::Route => {
            return output.emit(&Reply::Route {
                route: state.topology().route(),
            });
        }
        ShellCommand::Help => return output.emit(&Reply::Help { text: HELP }),
        ShellCommand::Quit => return Ok(()),
    };

    match result {
        Ok(message) => output.emit(&Reply::Ok { message: &message }),
        Err(reason) => output.emit(&Reply::Rejected {
            message: reason.to_string(),
            reason,
        }),
    }
}

/// Prints a status line for every turn the clock runs.
fn spawn_progress(
    state: Weak<WorldState>,
    changes: mpsc::Receiver<StateChanged>,
    output: Output,
) -> Result<()> {
    let _ = thread::Builder::new()
        .name("ghost-defence-progress".to_owned())
        .spawn(move || {
            let mut last_tick = 0;
            while changes.recv().is_ok() {
                let Some(state) = state.upgrade() else {
                    break;
                };
                let snapshot = state.query_state();
                drop(state);
                if snapshot.tick == last_tick {
                    continue;
                }
                last_tick = snapshot.tick;
                let reply = Reply::Progress {
                    snapshot: &snapshot,
                };
                if let Err(error) = output.emit(&reply) {
                    tracing::warn!(%error, "failed to print progress");
                }
                if snapshot.phase.is_terminal() {
                    let outcome = if snapshot.phase == WavePhase::GameWon {
                        "game won"
                    } else {
                        "game lost"
                    };
                    tracing::info!(tick = snapshot.tick, "{outcome}");
                }
            }
        })
        .context("failed to spawn progress thread")?;
    Ok(())
}
