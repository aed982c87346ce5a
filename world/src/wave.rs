//! Turn state machine that advances mobiles and resolves combat.

use ghost_defence_core::{
    AttackRecord, DefenderId, Event, GridLocation, MobileSnapshot, TargetSelector, WavePhase,
};

use crate::{
    defenders::DefenderRegistry,
    grid::GridTopology,
    mobiles::{Mobile, MobileRoster},
    tuning::Tuning,
};

/// Mutable world state a tick operates on, borrowed from the world.
pub(crate) struct Battlefield<'a> {
    pub(crate) topology: &'a GridTopology,
    pub(crate) tuning: &'a Tuning,
    pub(crate) defenders: &'a DefenderRegistry,
    pub(crate) mobiles: &'a mut MobileRoster,
    pub(crate) selector: &'a mut dyn TargetSelector,
    pub(crate) balance: &'a mut u32,
    pub(crate) lives: &'a mut u32,
}

/// Wave counters and the phase they drive.
#[derive(Debug)]
pub(crate) struct WaveSimulator {
    phase: WavePhase,
    wave: u32,
    spawned: u32,
    defeated: u32,
    tick: u64,
    last_attacks: Vec<AttackRecord>,
    candidates: Vec<MobileSnapshot>,
}

impl WaveSimulator {
    pub(crate) fn new() -> Self {
        Self {
            phase: WavePhase::Idle,
            wave: 1,
            spawned: 0,
            defeated: 0,
            tick: 0,
            last_attacks: Vec::new(),
            candidates: Vec::new(),
        }
    }

    pub(crate) fn phase(&self) -> WavePhase {
        self.phase
    }

    pub(crate) fn wave(&self) -> u32 {
        self.wave
    }

    pub(crate) fn spawned(&self) -> u32 {
        self.spawned
    }

    pub(crate) fn defeated(&self) -> u32 {
        self.defeated
    }

    pub(crate) fn tick_index(&self) -> u64 {
        self.tick
    }

    pub(crate) fn last_attacks(&self) -> &[AttackRecord] {
        &self.last_attacks
    }

    /// Moves from `Idle` to `WaveActive`; the caller validates the phase.
    pub(crate) fn begin_wave(&mut self, out_events: &mut Vec<Event>) {
        self.phase = WavePhase::WaveActive;
        self.spawned = 0;
        self.last_attacks.clear();
        out_events.push(Event::WaveStarted { wave: self.wave });
    }

    /// Returns from `WaveActive` to `Idle`, discarding the wave's mobiles.
    /// The caller validates the phase.
    pub(crate) fn cancel_wave(
        &mut self,
        mobiles: &mut MobileRoster,
        out_events: &mut Vec<Event>,
    ) {
        let withdrawn = u32::try_from(mobiles.clear()).unwrap_or(u32::MAX);
        self.phase = WavePhase::Idle;
        self.spawned = 0;
        self.last_attacks.clear();
        out_events.push(Event::WaveCancelled {
            wave: self.wave,
            withdrawn,
        });
    }

    /// Runs one turn: tick, move, spawn, combat, cleanup, wave-end check.
    pub(crate) fn tick(&mut self, field: Battlefield<'_>, out_events: &mut Vec<Event>) {
        let Battlefield {
            topology,
            tuning,
            defenders,
            mobiles,
            selector,
            balance,
            lives,
        } = field;

        self.tick = self.tick.saturating_add(1);
        self.last_attacks.clear();
        out_events.push(Event::TimeAdvanced { tick: self.tick });

        for mobile in mobiles.iter_mut() {
            mobile.gain_movement(tuning.speed_at(mobile.level));
        }

        self.move_mobiles(topology, tuning, mobiles, lives, out_events);
        if *lives == 0 {
            self.phase = WavePhase::GameLost;
            tracing::info!(wave = self.wave, "lives exhausted, game lost");
            out_events.push(Event::GameLost);
            return;
        }

        self.spawn_mobile(topology, tuning, mobiles, out_events);
        self.resolve_combat(topology, defenders, mobiles, selector, out_events);
        self.remove_defeated(topology, tuning, mobiles, balance, out_events);

        if mobiles.is_empty() && self.spawned >= tuning.mobiles_per_wave {
            self.complete_wave(tuning, out_events);
        }
    }

    /// Tail of the route first, so a mobile vacating a tile never collides with
    /// the one about to enter it.
    fn move_mobiles(
        &mut self,
        topology: &GridTopology,
        tuning: &Tuning,
        mobiles: &mut MobileRoster,
        lives: &mut u32,
        out_events: &mut Vec<Event>,
    ) {
        let route = topology.route();
        for (index, &location) in route.iter().enumerate().rev() {
            let Some(mobile) = mobiles.get_mut(location) else {
                continue;
            };
            if !mobile.ready_to_move(tuning.movement_threshold) {
                continue;
            }

            let Some(&next) = route.get(index + 1) else {
                if let Some(escaped) = mobiles.remove(location) {
                    *lives = lives.saturating_sub(1);
                    tracing::debug!(mobile = escaped.id.get(), lives = *lives, "mobile escaped");
                    out_events.push(Event::MobileEscaped {
                        mobile: escaped.id,
                        lives_remaining: *lives,
                    });
                }
                if *lives == 0 {
                    return;
                }
                continue;
            };

            let id = mobile.id;
            if mobiles.relocate(location, next, index + 1) {
                if let Some(moved) = mobiles.get_mut(next) {
                    moved.spend_movement(tuning.movement_threshold);
                }
                out_events.push(Event::MobileAdvanced {
                    mobile: id,
                    from: location,
                    to: next,
                });
            }
        }
    }

    fn spawn_mobile(
        &mut self,
        topology: &GridTopology,
        tuning: &Tuning,
        mobiles: &mut MobileRoster,
        out_events: &mut Vec<Event>,
    ) {
        if self.spawned >= tuning.mobiles_per_wave {
            return;
        }

        let entry = topology.entry();
        if mobiles.is_occupied(entry) {
            return;
        }

        let level = self.wave;
        let health = tuning.health_at(level);
        let id = mobiles.allocate_id();
        if mobiles.insert(Mobile::spawn(id, entry, level, health)) {
            self.spawned += 1;
            tracing::debug!(
                mobile = id.get(),
                level,
                active = mobiles.len(),
                "mobile spawned"
            );
            out_events.push(Event::MobileSpawned {
                mobile: id,
                location: entry,
                level,
                health,
            });
        }
    }

    /// Defenders act in purchase order. Damage lands immediately, so later
    /// defenders see the reduced health.
    fn resolve_combat(
        &mut self,
        topology: &GridTopology,
        defenders: &DefenderRegistry,
        mobiles: &mut MobileRoster,
        selector: &mut dyn TargetSelector,
        out_events: &mut Vec<Event>,
    ) {
        for defender in defenders.iter() {
            self.collect_candidates(topology, mobiles);
            if self.candidates.is_empty() {
                return;
            }

            let snapshot = defender.snapshot();
            let Some(target) = selector.select(&snapshot, &self.candidates) else {
                continue;
            };
            let Some(target_location) = self
                .candidates
                .iter()
                .find(|candidate| candidate.id == target && snapshot.reaches(candidate.location))
                .map(|candidate| candidate.location)
            else {
                tracing::warn!(
                    defender = defender.id.get(),
                    mobile = target.get(),
                    "target selector returned an unreachable mobile"
                );
                continue;
            };

            strike(
                mobiles,
                target_location,
                snapshot.id,
                snapshot.stats.power,
                out_events,
            );
            self.last_attacks.push(AttackRecord {
                defender: snapshot.id,
                target,
                location: target_location,
            });

            if let Some(divisor) = snapshot.kind.splash_divisor() {
                let splash = snapshot.stats.power / divisor;
                let splashed: Vec<GridLocation> = self
                    .candidates
                    .iter()
                    .filter(|candidate| {
                        candidate.id != target && candidate.location.is_adjacent(target_location)
                    })
                    .map(|candidate| candidate.location)
                    .collect();
                for location in splashed {
                    strike(mobiles, location, snapshot.id, splash, out_events);
                }
            }
        }
    }

    /// Live mobiles in route order.
    fn collect_candidates(&mut self, topology: &GridTopology, mobiles: &MobileRoster) {
        self.candidates.clear();
        for &location in topology.route() {
            if let Some(mobile) = mobiles.get(location) {
                if mobile.is_alive() {
                    self.candidates.push(mobile.snapshot());
                }
            }
        }
    }

    fn remove_defeated(
        &mut self,
        topology: &GridTopology,
        tuning: &Tuning,
        mobiles: &mut MobileRoster,
        balance: &mut u32,
        out_events: &mut Vec<Event>,
    ) {
        for &location in topology.route() {
            let defeated = mobiles
                .get(location)
                .is_some_and(|mobile| !mobile.is_alive());
            if !defeated {
                continue;
            }
            let Some(mobile) = mobiles.remove(location) else {
                continue;
            };

            let reward = tuning.reward_at(mobile.level);
            *balance = balance.saturating_add(reward);
            self.defeated = self.defeated.saturating_add(1);
            out_events.push(Event::MobileDefeated {
                mobile: mobile.id,
                reward,
            });
        }
    }

    fn complete_wave(&mut self, tuning: &Tuning, out_events: &mut Vec<Event>) {
        let finished = self.wave;
        self.wave = self.wave.saturating_add(1);
        self.spawned = 0;
        out_events.push(Event::WaveCompleted { wave: finished });

        if self.wave > tuning.waves_to_win {
            self.phase = WavePhase::GameWon;
            tracing::info!(wave = finished, "final wave cleared, game won");
            out_events.push(Event::GameWon);
        } else {
            self.phase = WavePhase::Idle;
            tracing::info!(wave = finished, "wave completed");
        }
    }
}

fn strike(
    mobiles: &mut MobileRoster,
    location: GridLocation,
    defender: DefenderId,
    damage: u32,
    out_events: &mut Vec<Event>,
) {
    let Some(mobile) = mobiles.get_mut(location) else {
        return;
    };
    if !mobile.is_alive() {
        return;
    }
    mobile.take_damage(damage);
    out_events.push(Event::MobileDamaged {
        mobile: mobile.id,
        defender,
        damage,
        remaining: mobile.health,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghost_defence_core::{DefenderKind, DefenderSnapshot, MobileId};

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

    struct Fixture {
        topology: GridTopology,
        tuning: Tuning,
        defenders: DefenderRegistry,
        mobiles: MobileRoster,
        selector: FirstInRange,
        balance: u32,
        lives: u32,
        simulator: WaveSimulator,
    }

    impl Fixture {
        fn new(grid: &str, tuning: Tuning) -> Self {
            let topology = GridTopology::parse(grid).expect("valid grid");
            Self {
                topology,
                balance: tuning.initial_balance,
                lives: tuning.initial_lives,
                tuning,
                defenders: DefenderRegistry::new(),
                mobiles: MobileRoster::new(),
                selector: FirstInRange,
                simulator: WaveSimulator::new(),
            }
        }

        fn tick(&mut self) -> Vec<Event> {
            let mut events = Vec::new();
            let field = Battlefield {
                topology: &self.topology,
                tuning: &self.tuning,
                defenders: &self.defenders,
                mobiles: &mut self.mobiles,
                selector: &mut self.selector,
                balance: &mut self.balance,
                lives: &mut self.lives,
            };
            self.simulator.tick(field, &mut events);
            events
        }
    }

    #[test]
    fn spawn_waits_for_a_free_entry() {
        let mut fixture = Fixture::new("1 3\n3 2 4\n", Tuning::default());
        let mut events = Vec::new();
        fixture.simulator.begin_wave(&mut events);

        let _ = fixture.tick();
        assert_eq!(fixture.simulator.spawned(), 1);

        // 80 movement is below the threshold, so the entry stays occupied.
        let _ = fixture.tick();
        assert_eq!(fixture.simulator.spawned(), 1);

        let _ = fixture.tick();
        assert_eq!(fixture.simulator.spawned(), 2);
    }

    #[test]
    fn escape_at_last_life_loses_immediately() {
        let tuning = Tuning {
            initial_lives: 1,
            mobiles_per_wave: 1,
            ..Tuning::default()
        };
        let mut fixture = Fixture::new("1 2\n3 4\n", tuning);
        let mut events = Vec::new();
        fixture.simulator.begin_wave(&mut events);

        let mut all = Vec::new();
        for _ in 0..10 {
            all.extend(fixture.tick());
            if fixture.simulator.phase() == WavePhase::GameLost {
                break;
            }
        }

        assert_eq!(fixture.simulator.phase(), WavePhase::GameLost);
        assert_eq!(fixture.lives, 0);
        assert_eq!(all.last(), Some(&Event::GameLost));
        assert!(!all.iter().any(|event| matches!(event, Event::WaveCompleted { .. })));
    }

    #[test]
    fn splash_spills_a_quarter_onto_neighbours() {
        let tuning = Tuning {
            health_per_level: 100,
            ..Tuning::default()
        };
        let mut fixture = Fixture::new("2 4\n3 2 2 4\n0 0 0 0\n", tuning);
        let _ = fixture
            .defenders
            .place(DefenderKind::Splash, GridLocation::new(1, 3));

        for (id, column) in [(1, 1), (2, 2), (3, 3)] {
            let mut mobile = Mobile::spawn(MobileId::new(id), GridLocation::new(0, column), 1, 100);
            mobile.route_index = column as usize;
            assert!(fixture.mobiles.insert(mobile));
        }

        let mut events = Vec::new();
        fixture.simulator.begin_wave(&mut events);
        fixture.simulator.spawned = fixture.tuning.mobiles_per_wave;
        let events = fixture.tick();

        let damage: Vec<(u32, u32)> = events
            .iter()
            .filter_map(|event| match event {
                Event::MobileDamaged { mobile, damage, .. } => Some((mobile.get(), *damage)),
                _ => None,
            })
            .collect();
        // First in route order is mobile 1; only mobile 2 neighbours it.
        assert_eq!(damage, vec![(1, 4), (2, 1)]);
    }

    #[test]
    fn defeated_mobiles_pay_their_reward() {
        let mut fixture = Fixture::new("2 3\n3 2 4\n0 0 0\n", Tuning::default());
        let _ = fixture
            .defenders
            .place(DefenderKind::Splash, GridLocation::new(1, 0));
        let mut mobile = Mobile::spawn(MobileId::new(7), GridLocation::new(0, 1), 2, 3);
        mobile.route_index = 1;
        assert!(fixture.mobiles.insert(mobile));

        let mut events = Vec::new();
        fixture.simulator.begin_wave(&mut events);
        fixture.simulator.spawned = fixture.tuning.mobiles_per_wave;
        let events = fixture.tick();

        assert!(events.contains(&Event::MobileDefeated {
            mobile: MobileId::new(7),
            reward: 50,
        }));
        assert_eq!(fixture.balance, 150);
        assert_eq!(fixture.simulator.defeated(), 1);
    }
}
