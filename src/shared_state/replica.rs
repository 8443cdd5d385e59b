use std::collections::HashMap;
use std::hash::Hash;

/// Where the last applied value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// Explicit action on this instance
    Local,
    /// Mirrored change received from the relay
    Remote,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SharedValue<V> {
    pub value: V,
    pub origin: Origin,
}

/// Last-applied-wins store for one feature's mirrored values.
///
/// `apply` only mutates; it never publishes. Publishing is the caller's
/// decision and is made exactly once, on the local path.
#[derive(Debug)]
pub struct Replica<K, V> {
    values: HashMap<K, SharedValue<V>>,
}

impl<K, V> Default for Replica<K, V> {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, V: PartialEq> Replica<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`. Returns true if the stored value changed.
    pub fn apply(&mut self, key: K, value: V, origin: Origin) -> bool {
        match self.values.get_mut(&key) {
            Some(existing) => {
                let changed = existing.value != value;
                existing.value = value;
                existing.origin = origin;
                changed
            }
            None => {
                self.values.insert(key, SharedValue { value, origin });
                true
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.values.get(key).map(|v| &v.value)
    }

    pub fn entry(&self, key: &K) -> Option<&SharedValue<V>> {
        self.values.get(key)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.values.remove(key).map(|v| v.value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
