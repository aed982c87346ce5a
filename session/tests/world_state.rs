use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Barrier,
    },
    thread,
    time::{Duration, Instant},
};

use ghost_defence_core::{DefenderKind, GridLocation, Rejection, WavePhase};
use ghost_defence_session::{SessionConfig, SessionError, StateChanged, WorldState};
use ghost_defence_world::{GridTopology, Tuning};

const CORRIDOR: &str = "2 3\n3 2 4\n0 0 0\n";

fn session(grid: &str, cadence_ms: u64, tuning: Tuning) -> WorldState {
    let topology = GridTopology::parse(grid).expect("valid grid");
    let config = SessionConfig {
        tuning,
        cadence_ms,
        ..SessionConfig::default()
    };
    WorldState::from_config(topology, &config)
}

#[test]
fn rejected_purchase_changes_nothing() {
    let state = session(
        CORRIDOR,
        1,
        Tuning {
            initial_balance: 5,
            ..Tuning::default()
        },
    );
    let changes = state.subscribe();
    let before = state.query_state();

    let result = state.buy_defender(DefenderKind::Basic, GridLocation::new(1, 1));

    assert_eq!(
        result,
        Err(Rejection::InsufficientFunds {
            required: 10,
            available: 5,
        })
    );
    assert_eq!(state.query_state(), before);
    assert!(changes.try_recv().is_err(), "rejections do not notify");
}

#[test]
fn mutations_notify_every_listener() {
    let state = session(CORRIDOR, 1, Tuning::default());
    let counter = Arc::new(AtomicUsize::new(0));
    let callback_counter = Arc::clone(&counter);
    state.on_change(move |_| {
        let _ = callback_counter.fetch_add(1, Ordering::SeqCst);
    });
    let changes = state.subscribe();
    let location = GridLocation::new(1, 2);

    state
        .buy_defender(DefenderKind::Slowing, location)
        .expect("purchase");
    state.upgrade_defender(location).expect("upgrade");
    state.sell_defender(location).expect("sale");

    assert_eq!(counter.load(Ordering::SeqCst), 3);
    assert_eq!(changes.try_iter().collect::<Vec<_>>(), vec![StateChanged; 3]);
    assert!(state.is_buildable(location));
}

#[test]
fn wave_runs_to_completion_on_the_clock() {
    let state = session(
        "1 3\n3 2 4\n",
        1,
        Tuning {
            initial_lives: 5,
            ..Tuning::default()
        },
    );
    let changes = state.subscribe();

    state.start_wave().expect("start wave");
    state.wait_for_wave();

    let snapshot = state.query_state();
    assert_eq!(snapshot.phase, WavePhase::Idle);
    assert_eq!(snapshot.wave, 2);
    assert_eq!(snapshot.lives, 2);
    assert!(!state.is_clock_running());
    // The start plus one notification per turn.
    let turns = usize::try_from(snapshot.tick).expect("small tick count");
    assert_eq!(changes.try_iter().count(), turns + 1);
}

#[test]
fn next_wave_can_start_once_the_previous_one_ends() {
    let state = session(
        "1 2\n3 4\n",
        1,
        Tuning {
            initial_lives: 10,
            mobiles_per_wave: 1,
            ..Tuning::default()
        },
    );

    for wave in 2..=3 {
        state.start_wave().expect("start wave");
        state.wait_for_wave();
        assert_eq!(state.query_state().wave, wave);
    }
}

#[test]
fn second_start_is_rejected_while_a_wave_runs() {
    let state = session(CORRIDOR, 60_000, Tuning::default());

    state.start_wave().expect("first start");
    let second = state.start_wave();

    assert!(matches!(
        second,
        Err(SessionError::Rejected(Rejection::WaveAlreadyActive))
    ));
    assert_eq!(second.expect_err("rejected").to_string(), "wave already active");
    assert!(state.is_clock_running());
    state.stop();
    assert!(!state.is_clock_running());
}

#[test]
fn concurrent_starts_create_a_single_wave() {
    let state = Arc::new(session(CORRIDOR, 60_000, Tuning::default()));
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let state = Arc::clone(&state);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let _ = barrier.wait();
                state.start_wave().is_ok()
            })
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|handle| handle.join().expect("starter thread"))
        .filter(|started| *started)
        .count();

    assert_eq!(successes, 1);
    assert_eq!(state.query_state().phase, WavePhase::WaveActive);
}

#[test]
fn purchases_interleave_with_turns() {
    let state = session(
        "2 4\n3 2 2 4\n0 0 0 0\n",
        1,
        Tuning {
            initial_lives: 10,
            mobiles_per_wave: 5,
            ..Tuning::default()
        },
    );
    state.start_wave().expect("start wave");

    for column in 0..4 {
        let _ = state.buy_defender(DefenderKind::Basic, GridLocation::new(1, column));
        thread::sleep(Duration::from_millis(2));
    }
    state.wait_for_wave();

    let snapshot = state.query_state();
    let spent: u32 = snapshot
        .defenders
        .iter()
        .map(|defender| defender.kind.base_cost())
        .sum();
    let earned = snapshot.defeated * 40;
    assert_eq!(snapshot.balance, 100 - spent + earned);
    assert_eq!(snapshot.phase, WavePhase::Idle);
}

#[test]
fn dropping_the_state_stops_a_waiting_clock() {
    let state = session(CORRIDOR, 60_000, Tuning::default());
    state.start_wave().expect("start wave");

    let started = Instant::now();
    drop(state);

    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn stopping_mid_wave_lets_the_wave_start_again() {
    let state = session(
        "1 4\n3 2 2 4\n",
        20,
        Tuning {
            initial_lives: 10,
            ..Tuning::default()
        },
    );
    let changes = state.subscribe();
    state.start_wave().expect("start wave");
    changes
        .recv_timeout(Duration::from_secs(5))
        .expect("start notification");
    changes
        .recv_timeout(Duration::from_secs(5))
        .expect("first turn");

    state.stop();

    let snapshot = state.query_state();
    assert_eq!(snapshot.phase, WavePhase::Idle);
    assert_eq!(snapshot.wave, 1);
    assert!(snapshot.mobiles.is_empty());
    assert!(!state.is_clock_running());

    state.start_wave().expect("restart after stop");
    assert_eq!(state.query_state().phase, WavePhase::WaveActive);
    assert!(state.is_clock_running());
}

#[test]
fn cancel_wave_needs_an_active_wave() {
    let state = session(CORRIDOR, 60_000, Tuning::default());

    assert_eq!(state.cancel_wave(), Err(Rejection::NoActiveWave));

    state.start_wave().expect("start wave");
    state.cancel_wave().expect("cancel");
    assert_eq!(state.query_state().phase, WavePhase::Idle);
    assert!(state.buy_defender(DefenderKind::Basic, GridLocation::new(1, 1)).is_ok());
}

#[test]
fn stop_is_prompt_while_another_thread_waits_for_the_wave() {
    let state = Arc::new(session(
        "1 4\n3 2 2 4\n",
        200,
        Tuning {
            initial_lives: 100,
            mobiles_per_wave: 50,
            ..Tuning::default()
        },
    ));
    state.start_wave().expect("start wave");

    let waiting = Arc::clone(&state);
    let waiter = thread::spawn(move || waiting.wait_for_wave());
    thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    state.stop();
    let elapsed = started.elapsed();

    waiter.join().expect("waiting thread");
    assert!(elapsed < Duration::from_secs(2), "stop took {elapsed:?}");
    assert_eq!(state.query_state().phase, WavePhase::Idle);
}
