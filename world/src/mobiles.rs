//! Hostile mobiles and the per-tile roster that holds them.

use std::collections::BTreeMap;

use ghost_defence_core::{GridLocation, MobileId, MobileSnapshot};

/// A single mobile walking the route.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Mobile {
    pub(crate) id: MobileId,
    pub(crate) location: GridLocation,
    pub(crate) route_index: usize,
    pub(crate) health: u32,
    pub(crate) level: u32,
    pub(crate) movement: u32,
}

impl Mobile {
    pub(crate) fn spawn(id: MobileId, location: GridLocation, level: u32, health: u32) -> Self {
        Self {
            id,
            location,
            route_index: 0,
            health,
            level: level.max(1),
            movement: 0,
        }
    }

    /// Health never drops below zero.
    pub(crate) fn take_damage(&mut self, damage: u32) {
        self.health = self.health.saturating_sub(damage);
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub(crate) fn gain_movement(&mut self, speed: u32) {
        self.movement = self.movement.saturating_add(speed);
    }

    pub(crate) fn ready_to_move(&self, threshold: u32) -> bool {
        self.movement >= threshold
    }

    pub(crate) fn spend_movement(&mut self, threshold: u32) {
        self.movement = self.movement.saturating_sub(threshold);
    }

    pub(crate) fn snapshot(&self) -> MobileSnapshot {
        MobileSnapshot {
            id: self.id,
            location: self.location,
            route_index: self.route_index,
            health: self.health,
            level: self.level,
            movement: self.movement,
        }
    }
}

/// Mobiles keyed by the tile they occupy; at most one per tile.
#[derive(Debug, Default)]
pub(crate) struct MobileRoster {
    entries: BTreeMap<GridLocation, Mobile>,
    next_mobile_id: u32,
}

impl MobileRoster {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn allocate_id(&mut self) -> MobileId {
        self.next_mobile_id = self.next_mobile_id.saturating_add(1);
        MobileId::new(self.next_mobile_id)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_occupied(&self, location: GridLocation) -> bool {
        self.entries.contains_key(&location)
    }

    pub(crate) fn get(&self, location: GridLocation) -> Option<&Mobile> {
        self.entries.get(&location)
    }

    pub(crate) fn get_mut(&mut self, location: GridLocation) -> Option<&mut Mobile> {
        self.entries.get_mut(&location)
    }

    /// Places a mobile on its tile. Returns `false` without inserting when the
    /// tile is already taken.
    pub(crate) fn insert(&mut self, mobile: Mobile) -> bool {
        if self.entries.contains_key(&mobile.location) {
            return false;
        }
        let _ = self.entries.insert(mobile.location, mobile);
        true
    }

    pub(crate) fn remove(&mut self, location: GridLocation) -> Option<Mobile> {
        self.entries.remove(&location)
    }

    /// Moves the mobile on `from` to `to` if `to` is free.
    pub(crate) fn relocate(&mut self, from: GridLocation, to: GridLocation, route_index: usize) -> bool {
        if self.entries.contains_key(&to) {
            return false;
        }
        let Some(mut mobile) = self.entries.remove(&from) else {
            return false;
        };
        mobile.location = to;
        mobile.route_index = route_index;
        let _ = self.entries.insert(to, mobile);
        true
    }

    /// Removes every mobile, returning how many were on the route.
    pub(crate) fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Mobile> {
        self.entries.values_mut()
    }

    /// Snapshots of every mobile ordered by route position.
    pub(crate) fn snapshots(&self) -> Vec<MobileSnapshot> {
        let mut snapshots: Vec<MobileSnapshot> =
            self.entries.values().map(Mobile::snapshot).collect();
        snapshots.sort_by_key(|snapshot| (snapshot.route_index, snapshot.id));
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mobile_at(id: u32, row: u32, column: u32) -> Mobile {
        Mobile::spawn(MobileId::new(id), GridLocation::new(row, column), 1, 10)
    }

    #[test]
    fn damage_clamps_at_zero() {
        let mut mobile = mobile_at(1, 0, 0);
        mobile.take_damage(25);
        assert_eq!(mobile.health, 0);
        assert!(!mobile.is_alive());
    }

    #[test]
    fn roster_refuses_shared_tiles() {
        let mut roster = MobileRoster::new();
        assert!(roster.insert(mobile_at(1, 0, 0)));
        assert!(!roster.insert(mobile_at(2, 0, 0)));
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn relocate_requires_a_free_destination() {
        let mut roster = MobileRoster::new();
        assert!(roster.insert(mobile_at(1, 0, 0)));
        assert!(roster.insert(mobile_at(2, 0, 1)));

        assert!(!roster.relocate(GridLocation::new(0, 0), GridLocation::new(0, 1), 1));
        assert!(roster.relocate(GridLocation::new(0, 1), GridLocation::new(0, 2), 2));
        assert!(roster.relocate(GridLocation::new(0, 0), GridLocation::new(0, 1), 1));

        let moved = roster.get(GridLocation::new(0, 1)).expect("moved mobile");
        assert_eq!(moved.id, MobileId::new(1));
        assert_eq!(moved.route_index, 1);
    }

    #[test]
    fn identifiers_are_monotonic() {
        let mut roster = MobileRoster::new();
        let first = roster.allocate_id();
        let second = roster.allocate_id();
        assert!(second > first);
    }
}
