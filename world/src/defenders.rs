//! Authoritative defender state management utilities.

use std::collections::{BTreeMap, HashMap};

use ghost_defence_core::{DefenderId, DefenderKind, DefenderSnapshot, GridLocation};

/// Snapshot of a defender stored inside the world.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Defender {
    /// Identifier allocated by the world for the defender.
    pub(crate) id: DefenderId,
    /// Kind of defender that was constructed.
    pub(crate) kind: DefenderKind,
    /// Tile the defender occupies.
    pub(crate) location: GridLocation,
    /// Current level, starting at one.
    pub(crate) level: u32,
}

impl Defender {
    pub(crate) fn snapshot(&self) -> DefenderSnapshot {
        DefenderSnapshot {
            id: self.id,
            kind: self.kind,
            location: self.location,
            level: self.level,
            stats: self.kind.stats_at(self.level),
        }
    }
}

/// Registry that stores defenders and manages identifier allocation.
///
/// Entries are keyed by identifier so iteration follows purchase order.
#[derive(Debug)]
pub(crate) struct DefenderRegistry {
    entries: BTreeMap<DefenderId, Defender>,
    by_location: HashMap<GridLocation, DefenderId>,
    next_defender_id: DefenderId,
}

impl DefenderRegistry {
    /// Creates an empty defender registry with a reset identifier counter.
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            by_location: HashMap::new(),
            next_defender_id: DefenderId::new(0),
        }
    }

    pub(crate) fn is_occupied(&self, location: GridLocation) -> bool {
        self.by_location.contains_key(&location)
    }

    pub(crate) fn at(&self, location: GridLocation) -> Option<&Defender> {
        self.by_location
            .get(&location)
            .and_then(|id| self.entries.get(id))
    }

    pub(crate) fn at_mut(&mut self, location: GridLocation) -> Option<&mut Defender> {
        let id = self.by_location.get(&location)?;
        self.entries.get_mut(id)
    }

    /// Stores a new level one defender; the caller checks buildability.
    pub(crate) fn place(&mut self, kind: DefenderKind, location: GridLocation) -> DefenderId {
        let id = self.next_defender_id;
        self.next_defender_id = DefenderId::new(id.get().saturating_add(1));
        let _ = self.entries.insert(
            id,
            Defender {
                id,
                kind,
                location,
                level: 1,
            },
        );
        let _ = self.by_location.insert(location, id);
        id
    }

    pub(crate) fn remove(&mut self, location: GridLocation) -> Option<Defender> {
        let id = self.by_location.remove(&location)?;
        self.entries.remove(&id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Defender> {
        self.entries.values()
    }

    pub(crate) fn snapshots(&self) -> Vec<DefenderSnapshot> {
        self.iter().map(Defender::snapshot).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_starts_empty_with_zero_identifier() {
        let registry = DefenderRegistry::new();
        assert!(registry.entries.is_empty());
        assert_eq!(registry.next_defender_id.get(), 0);
    }

    #[test]
    fn placement_indexes_by_location() {
        let mut registry = DefenderRegistry::new();
        let location = GridLocation::new(2, 3);
        let id = registry.place(DefenderKind::Splash, location);

        assert!(registry.is_occupied(location));
        let defender = registry.at(location).expect("placed defender");
        assert_eq!(defender.id, id);
        assert_eq!(defender.level, 1);
    }

    #[test]
    fn removal_frees_the_tile() {
        let mut registry = DefenderRegistry::new();
        let location = GridLocation::new(1, 1);
        let _ = registry.place(DefenderKind::Basic, location);

        let removed = registry.remove(location).expect("removed defender");
        assert_eq!(removed.kind, DefenderKind::Basic);
        assert!(!registry.is_occupied(location));
        assert!(registry.remove(location).is_none());
    }

    #[test]
    fn iteration_follows_purchase_order() {
        let mut registry = DefenderRegistry::new();
        let first = registry.place(DefenderKind::Basic, GridLocation::new(5, 5));
        let second = registry.place(DefenderKind::Basic, GridLocation::new(0, 0));
        let order: Vec<_> = registry.iter().map(|defender| defender.id).collect();
        assert_eq!(order, vec![first, second]);
    }
}
