use crate::entity::{ConnectionId, GroupId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;

/// Role oracle for autonomous-entity groups.
///
/// The first connection to ask for a vacant group becomes its host. There is
/// no demotion message: when a host leaves, its slot is simply freed and the
/// observers find out through snapshot silence.
pub struct Coordinator {
    hosts: DashMap<GroupId, ConnectionId>,
}

impl Coordinator {
    pub fn new() -> Self {
        Self {
            hosts: DashMap::new(),
        }
    }

    /// Returns true if `conn` is (or just became) the group's host.
    /// Re-requesting from the current host is idempotent.
    pub fn request_role(&self, group: &GroupId, conn: ConnectionId) -> bool {
        let host = self.hosts.entry(group.clone()).or_insert(conn);
        *host.value() == conn
    }

    /// Record `conn` as host only if the group has none. Returns true when adopted.
    pub fn adopt_if_vacant(&self, group: &GroupId, conn: ConnectionId) -> bool {
        match self.hosts.entry(group.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(conn);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Free every group hosted by `conn`, returning the freed groups
    pub fn release(&self, conn: ConnectionId) -> Vec<GroupId> {
        let held: Vec<GroupId> = self
            .hosts
            .iter()
            .filter(|entry| *entry.value() == conn)
            .map(|entry| entry.key().clone())
            .collect();

        for group in &held {
            self.hosts.remove_if(group, |_, host| *host == conn);
        }

        held
    }

    pub fn host_of(&self, group: &GroupId) -> Option<ConnectionId> {
        self.hosts.get(group).map(|entry| *entry.value())
    }

    pub fn hosts(&self) -> BTreeMap<String, ConnectionId> {
        self.hosts
            .iter()
            .map(|entry| (entry.key().to_string(), *entry.value()))
            .collect()
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}
