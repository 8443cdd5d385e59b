use crate::entity::ConnectionId;
use crate::protocol::{StateChange, StateKey};
use dashmap::DashMap;
use tracing::info;

/// Latest mirrored state change per key, replayed to instances that join late.
///
/// In-memory only and cleared when the room empties; there is no durability.
pub struct SessionStore {
    changes: DashMap<StateKey, StateChange>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            changes: DashMap::new(),
        }
    }

    /// Record a change (last write wins per key)
    pub fn record(&self, change: &StateChange) {
        self.changes.insert(change.key(), change.clone());
    }

    pub fn get(&self, key: &StateKey) -> Option<StateChange> {
        self.changes.get(key).map(|c| c.clone())
    }

    /// Every recorded change in key order
    pub fn replay(&self) -> Vec<StateChange> {
        let mut entries: Vec<(StateKey, StateChange)> = self
            .changes
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        entries.sort_by_key(|(key, _)| *key);
        entries.into_iter().map(|(_, change)| change).collect()
    }

    /// Vacate every seat occupied by `conn`, returning the release changes to broadcast
    pub fn release_seats(&self, conn: ConnectionId) -> Vec<StateChange> {
        let mut released = Vec::new();

        for mut entry in self.changes.iter_mut() {
            if let StateChange::SeatOccupied { seat_id, occupant } = entry.value_mut() {
                if *occupant == Some(conn) {
                    *occupant = None;
                    released.push(StateChange::SeatOccupied {
                        seat_id: *seat_id,
                        occupant: None,
                    });
                }
            }
        }

        released
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn clear(&self) {
        let count = self.changes.len();
        self.changes.clear();
        if count > 0 {
            info!(keys = count, "Session state cleared");
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
