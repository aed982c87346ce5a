use ghost_defence_core::{
    Command, DefenderKind, DefenderSnapshot, Event, GridLocation, MobileId, MobileSnapshot,
    Rejection, TargetSelector, WavePhase,
};
use ghost_defence_world::{self as world, query, GridTopology, Tuning, World};

#[derive(Debug, Default)]
struct FirstInRange;

impl TargetSelector for FirstInRange {
    fn select(
        &mut self,
        defender: &DefenderSnapshot,
        candidates: &[MobileSnapshot],
    ) -> Option<MobileId> {
        candidates
            .iter()
            .find(|candidate| defender.reaches(candidate.location))
            .map(|candidate| candidate.id)
    }
}

fn build_world(grid: &str, tuning: Tuning) -> World {
    let topology = GridTopology::parse(grid).expect("valid grid");
    World::new(topology, tuning, Box::new(FirstInRange))
}

fn run_until_idle(world: &mut World, max_ticks: usize) -> Vec<Event> {
    let mut log = Vec::new();
    for _ in 0..max_ticks {
        let mut events = Vec::new();
        world::apply(world, Command::Tick, &mut events).expect("tick during wave");
        log.extend(events);
        if query::phase(world) != WavePhase::WaveActive {
            break;
        }
    }
    log
}

#[test]
fn corridor_wave_without_defenders_leaks_every_mobile() {
    let tuning = Tuning {
        initial_lives: 5,
        ..Tuning::default()
    };
    let mut world = build_world("1 3\n3 2 4\n", tuning);
    let mut events = Vec::new();
    world::apply(&mut world, Command::StartWave, &mut events).expect("start wave");

    let log = run_until_idle(&mut world, 100);

    let spawned: Vec<MobileId> = log
        .iter()
        .filter_map(|event| match event {
            Event::MobileSpawned { mobile, location, .. } => {
                assert_eq!(*location, GridLocation::new(0, 0));
                Some(*mobile)
            }
            _ => None,
        })
        .collect();
    let escaped: Vec<MobileId> = log
        .iter()
        .filter_map(|event| match event {
            Event::MobileEscaped { mobile, .. } => Some(*mobile),
            _ => None,
        })
        .collect();

    assert_eq!(spawned.len(), 3);
    assert_eq!(escaped, spawned, "mobiles leave in spawn order");
    assert!(log.contains(&Event::WaveCompleted { wave: 1 }));

    let snapshot = query::snapshot(&world);
    assert_eq!(snapshot.lives, 2);
    assert_eq!(snapshot.phase, WavePhase::Idle);
    assert_eq!(snapshot.wave, 2);
    assert!(snapshot.mobiles.is_empty());
}

#[test]
fn mobiles_never_share_a_tile() {
    let tuning = Tuning {
        initial_lives: 10,
        mobiles_per_wave: 6,
        ..Tuning::default()
    };
    let mut world = build_world("3 3\n3 2 2\n1 1 2\n4 2 2\n", tuning);
    let mut events = Vec::new();
    world::apply(&mut world, Command::StartWave, &mut events).expect("start wave");

    for _ in 0..200 {
        let mut events = Vec::new();
        world::apply(&mut world, Command::Tick, &mut events).expect("tick");
        let snapshot = query::snapshot(&world);
        let mut tiles: Vec<GridLocation> = snapshot
            .mobiles
            .iter()
            .map(|mobile| mobile.location)
            .collect();
        let before = tiles.len();
        tiles.sort();
        tiles.dedup();
        assert_eq!(tiles.len(), before);

        let route = query::topology(&world).route();
        for mobile in &snapshot.mobiles {
            assert_eq!(route[mobile.route_index], mobile.location);
        }
        if snapshot.phase != WavePhase::WaveActive {
            break;
        }
    }

    assert_eq!(query::phase(&world), WavePhase::Idle);
    assert_eq!(query::lives(&world), 4);
}

#[test]
fn basic_defender_deals_its_power_each_tick() {
    let tuning = Tuning {
        mobiles_per_wave: 1,
        ..Tuning::default()
    };
    let mut world = build_world("2 4\n3 2 2 4\n0 0 0 0\n", tuning);
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::BuyDefender {
            kind: DefenderKind::Basic,
            location: GridLocation::new(1, 1),
        },
        &mut events,
    )
    .expect("purchase");
    world::apply(&mut world, Command::StartWave, &mut events).expect("start wave");

    let mut health_trace = Vec::new();
    let mut rewards = Vec::new();
    for _ in 0..10 {
        let mut events = Vec::new();
        world::apply(&mut world, Command::Tick, &mut events).expect("tick");
        for event in &events {
            match event {
                Event::MobileDamaged {
                    damage, remaining, ..
                } => {
                    assert_eq!(*damage, 2);
                    health_trace.push(*remaining);
                }
                Event::MobileDefeated { reward, .. } => rewards.push(*reward),
                _ => {}
            }
        }
        if query::phase(&world) != WavePhase::WaveActive {
            break;
        }
    }

    assert_eq!(health_trace, vec![8, 6, 4, 2, 0]);
    assert_eq!(rewards, vec![40]);
    assert_eq!(query::balance(&world), 100 - 10 + 40);
    assert_eq!(query::lives(&world), 3);
    assert_eq!(query::snapshot(&world).defeated, 1);
}

#[test]
fn defeated_mobile_lingers_until_cleanup() {
    let tuning = Tuning {
        mobiles_per_wave: 1,
        health_per_level: 2,
        ..Tuning::default()
    };
    let mut world = build_world("2 3\n3 2 4\n0 0 0\n", tuning);
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::BuyDefender {
            kind: DefenderKind::Basic,
            location: GridLocation::new(1, 0),
        },
        &mut events,
    )
    .expect("purchase");
    world::apply(&mut world, Command::StartWave, &mut events).expect("start wave");

    let mut events = Vec::new();
    world::apply(&mut world, Command::Tick, &mut events).expect("tick");

    let damaged = events
        .iter()
        .position(|event| matches!(event, Event::MobileDamaged { remaining: 0, .. }))
        .expect("lethal hit");
    let defeated = events
        .iter()
        .position(|event| matches!(event, Event::MobileDefeated { .. }))
        .expect("cleanup");
    assert!(damaged < defeated);
    assert!(query::snapshot(&world).mobiles.is_empty());
}

#[test]
fn clearing_the_final_wave_wins_the_game() {
    let tuning = Tuning {
        initial_lives: 10,
        mobiles_per_wave: 1,
        waves_to_win: 2,
        ..Tuning::default()
    };
    let mut world = build_world("1 2\n3 4\n", tuning);

    for wave in 1..=2 {
        let mut events = Vec::new();
        world::apply(&mut world, Command::StartWave, &mut events).expect("start wave");
        assert_eq!(events, vec![Event::WaveStarted { wave }]);
        let log = run_until_idle(&mut world, 50);
        assert!(log.contains(&Event::WaveCompleted { wave }));
    }

    assert_eq!(query::phase(&world), WavePhase::GameWon);

    let mut events = Vec::new();
    assert_eq!(
        world::apply(&mut world, Command::StartWave, &mut events),
        Err(Rejection::GameOver)
    );
    assert!(events.is_empty());
}

#[test]
fn losing_every_life_ends_the_game() {
    let mut world = build_world("1 3\n3 2 4\n", Tuning::default());
    let mut events = Vec::new();
    world::apply(&mut world, Command::StartWave, &mut events).expect("start wave");

    let log = run_until_idle(&mut world, 100);

    assert_eq!(log.last(), Some(&Event::GameLost));
    assert_eq!(query::phase(&world), WavePhase::GameLost);
    assert_eq!(query::lives(&world), 0);
    assert!(!log
        .iter()
        .any(|event| matches!(event, Event::WaveCompleted { .. })));

    let mut events = Vec::new();
    assert_eq!(
        world::apply(&mut world, Command::Tick, &mut events),
        Err(Rejection::GameOver)
    );
}
