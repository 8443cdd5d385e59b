use super::InterpolationState;
use crate::config::ReconcileConfig;
use crate::entity::{EntityId, Pose, Registry};
use crate::protocol::EntitySnapshot;
use tracing::debug;

/// Per-frame output for one remotely driven entity
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EntityFrame {
    pub id: EntityId,
    pub pose: Pose,
    /// Drives the walk/idle animation choice
    pub moving: bool,
}

/// Smooths observer-side entities toward the latest authoritative snapshot.
///
/// Until the visual representation is ready (`set_ready`), snapshots for
/// unknown entities are held as pending and instantiated later at their
/// latest snapshot pose.
pub struct EntityReconciler {
    states: Registry<InterpolationState>,
    pending: Registry<Pose>,
    ready: bool,
    lerp_factor: f32,
    snap_epsilon: f32,
}

impl EntityReconciler {
    pub fn new(config: &ReconcileConfig) -> Self {
        Self {
            states: Registry::new(),
            pending: Registry::new(),
            ready: false,
            lerp_factor: config.lerp_factor.clamp(0.0, 1.0),
            snap_epsilon: config.snap_epsilon,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Mark the visual representation as loaded and instantiate pending entities.
    /// Returns the ids spawned.
    pub fn set_ready(&mut self) -> Vec<EntityId> {
        self.ready = true;
        let mut spawned = Vec::new();
        for (id, pose) in self.pending.drain() {
            self.states.insert(id, InterpolationState::at(pose, self.lerp_factor));
            spawned.push(id);
        }
        if !spawned.is_empty() {
            debug!(count = spawned.len(), "Instantiated pending entities");
        }
        spawned
    }

    /// Feed one snapshot batch. Newer targets overwrite older ones.
    /// Returns ids that were instantiated by this batch.
    pub fn apply_batch(&mut self, snapshots: &[EntitySnapshot]) -> Vec<EntityId> {
        let mut spawned = Vec::new();

        for snapshot in snapshots {
            let pose = snapshot.pose();
            if let Some(state) = self.states.find_mut(snapshot.entity_id) {
                state.set_target(pose);
            } else if self.ready {
                self.states
                    .insert(snapshot.entity_id, InterpolationState::at(pose, self.lerp_factor));
                spawned.push(snapshot.entity_id);
            } else {
                self.pending.insert(snapshot.entity_id, pose);
            }
        }

        spawned
    }

    /// Advance every instantiated entity one frame
    pub fn tick(&mut self) -> Vec<EntityFrame> {
        let epsilon = self.snap_epsilon;
        self.states
            .ids()
            .into_iter()
            .filter_map(|id| {
                let state = self.states.find_mut(id)?;
                let moving = state.step(epsilon);
                Some(EntityFrame {
                    id,
                    pose: state.current,
                    moving,
                })
            })
            .collect()
    }

    pub fn pose(&self, id: EntityId) -> Option<Pose> {
        self.states.find(id).map(|s| s.current)
    }

    pub fn state(&self, id: EntityId) -> Option<&InterpolationState> {
        self.states.find(id)
    }

    pub fn is_pending(&self, id: EntityId) -> bool {
        self.pending.contains(id)
    }

    /// Entities known locally, instantiated or pending
    pub fn known_count(&self) -> usize {
        self.states.len() + self.pending.len()
    }

    /// Destroy an entity's interpolation state
    pub fn despawn(&mut self, id: EntityId) -> bool {
        let removed = self.states.remove(id).is_some();
        let was_pending = self.pending.remove(id).is_some();
        removed || was_pending
    }

    /// Hand every known entity over, e.g. to the local simulator after a
    /// takeover. Instantiated entities report their current visual pose.
    pub fn drain_poses(&mut self) -> Vec<(EntityId, Pose)> {
        let mut poses: Vec<(EntityId, Pose)> = self
            .states
            .drain()
            .into_iter()
            .map(|(id, state)| (id, state.current))
            .collect();
        poses.extend(self.pending.drain());
        poses
    }
}
