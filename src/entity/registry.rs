use super::EntityId;
use std::collections::HashMap;

/// Owned table of per-entity state keyed by `EntityId`.
///
/// Each subsystem (reconciler, simulator) owns its own registry; lookups
/// return `Option` so a missing entity is a value, not a sentinel.
#[derive(Debug, Clone)]
pub struct Registry<T> {
    slots: HashMap<EntityId, T>,
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }

    /// Look up an entity by id
    pub fn find(&self, id: EntityId) -> Option<&T> {
        self.slots.get(&id)
    }

    pub fn find_mut(&mut self, id: EntityId) -> Option<&mut T> {
        self.slots.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Insert (spawn) an entity, returning the previous state if the id was taken
    pub fn insert(&mut self, id: EntityId, value: T) -> Option<T> {
        self.slots.insert(id, value)
    }

    /// Remove (despawn) an entity
    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        self.slots.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Ids in stable (sorted) order, so per-tick iteration is deterministic
    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.slots.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &T)> {
        self.slots.iter()
    }

    /// Remove every entity, handing ownership to the caller
    pub fn drain(&mut self) -> Vec<(EntityId, T)> {
        let mut out: Vec<(EntityId, T)> = self.slots.drain().collect();
        out.sort_by_key(|(id, _)| *id);
        out
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}
