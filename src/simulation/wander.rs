use super::obstacle::{is_blocked, Obstacle};
use crate::config::WanderConfig;
use crate::entity::{EntityId, Pose, Registry, Vec3};
use crate::protocol::EntitySnapshot;
use crate::reconcile::EntityFrame;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tracing::debug;

/// Attempts at finding a target outside every obstacle before settling
const TARGET_ATTEMPTS: usize = 8;

/// Frame length that `stuck_frames` and `stuck_displacement` are expressed in.
/// Stuck detection runs on elapsed time, so other frame rates behave the same.
pub const REFERENCE_FRAME: Duration = Duration::from_millis(16);

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WanderPhase {
    Idle,
    Seeking { target: Vec3 },
    /// Collision checks bypassed until `remaining` runs out
    Ghost { target: Vec3, remaining: Duration },
}

impl WanderPhase {
    pub fn target(&self) -> Option<Vec3> {
        match self {
            WanderPhase::Idle => None,
            WanderPhase::Seeking { target } | WanderPhase::Ghost { target, .. } => Some(*target),
        }
    }

    pub fn is_ghost(&self) -> bool {
        matches!(self, WanderPhase::Ghost { .. })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Pet {
    pub pose: Pose,
    pub phase: WanderPhase,
    since_pick: Duration,
    /// Time spent below the stuck speed
    stuck_for: Duration,
}

impl Pet {
    fn at(pose: Pose) -> Self {
        Self {
            pose,
            phase: WanderPhase::Idle,
            since_pick: Duration::ZERO,
            stuck_for: Duration::ZERO,
        }
    }
}

/// Wander AI for the pets this instance is authoritative for
pub struct LocalSimulator {
    pets: Registry<Pet>,
    obstacles: Vec<Obstacle>,
    config: WanderConfig,
    rng: StdRng,
}

impl LocalSimulator {
    pub fn new(config: &WanderConfig, obstacles: Vec<Obstacle>, seed: u64) -> Self {
        Self {
            pets: Registry::new(),
            obstacles,
            config: config.clone(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn spawn(&mut self, id: EntityId, position: Vec3) {
        self.pets.insert(id, Pet::at(Pose::new(position, 0.0)));
    }

    /// Take over pets from the reconciler, continuing from their last seen poses
    pub fn adopt(&mut self, poses: Vec<(EntityId, Pose)>) {
        for (id, pose) in poses {
            if !self.pets.contains(id) {
                self.pets.insert(id, Pet::at(pose));
            }
        }
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        self.pets.remove(id).is_some()
    }

    /// Send a pet toward `target`, restarting its wander interval
    pub fn seek(&mut self, id: EntityId, target: Vec3) -> bool {
        match self.pets.find_mut(id) {
            Some(pet) => {
                pet.phase = WanderPhase::Seeking { target };
                pet.since_pick = Duration::ZERO;
                pet.stuck_for = Duration::ZERO;
                true
            }
            None => false,
        }
    }

    pub fn pet(&self, id: EntityId) -> Option<&Pet> {
        self.pets.find(id)
    }

    pub fn pose(&self, id: EntityId) -> Option<Pose> {
        self.pets.find(id).map(|p| p.pose)
    }

    pub fn phase(&self, id: EntityId) -> Option<WanderPhase> {
        self.pets.find(id).map(|p| p.phase)
    }

    pub fn len(&self) -> usize {
        self.pets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pets.is_empty()
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.pets.ids()
    }

    /// Advance every pet by `dt`
    pub fn tick(&mut self, dt: Duration) -> Vec<EntityFrame> {
        let mut frames = Vec::with_capacity(self.pets.len());
        for id in self.pets.ids() {
            let Some(pet) = self.pets.find_mut(id) else {
                continue;
            };
            let moving = step_pet(id, pet, dt, &self.config, &self.obstacles, &mut self.rng);
            frames.push(EntityFrame {
                id,
                pose: pet.pose,
                moving,
            });
        }
        frames
    }

    /// Current poses as a snapshot batch payload
    pub fn snapshots(&self) -> Vec<EntitySnapshot> {
        self.pets
            .ids()
            .into_iter()
            .filter_map(|id| self.pets.find(id).map(|pet| EntitySnapshot::new(id, pet.pose)))
            .collect()
    }
}

fn pick_target(
    rng: &mut StdRng,
    config: &WanderConfig,
    obstacles: &[Obstacle],
    height: f32,
) -> Vec3 {
    let (min_x, max_x) = ordered(config.min_x, config.max_x);
    let (min_z, max_z) = ordered(config.min_z, config.max_z);

    let mut target = Vec3::new(min_x, height, min_z);
    for _ in 0..TARGET_ATTEMPTS {
        target = Vec3::new(rng.gen_range(min_x..=max_x), height, rng.gen_range(min_z..=max_z));
        if !is_blocked(obstacles, &target, config.pet_radius) {
            break;
        }
    }
    target
}

fn ordered(a: f32, b: f32) -> (f32, f32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// One wander step. Returns true if the pet moved.
fn step_pet(
    id: EntityId,
    pet: &mut Pet,
    dt: Duration,
    config: &WanderConfig,
    obstacles: &[Obstacle],
    rng: &mut StdRng,
) -> bool {
    pet.since_pick += dt;
    let height = pet.pose.position.y;

    if let WanderPhase::Ghost { target, remaining } = pet.phase {
        let remaining = remaining.saturating_sub(dt);
        if remaining.is_zero() {
            debug!(pet = %id, "Ghost expired");
            pet.phase = WanderPhase::Idle;
            return false;
        }
        pet.phase = WanderPhase::Ghost { target, remaining };
    }

    let repick = match pet.phase {
        WanderPhase::Idle => true,
        WanderPhase::Seeking { .. } | WanderPhase::Ghost { .. } => {
            pet.since_pick >= Duration::from_millis(config.interval_ms)
        }
    };
    if repick {
        retarget(pet, pick_target(rng, config, obstacles, height));
    }

    let Some(target) = pet.phase.target() else {
        return false;
    };
    let ghost = pet.phase.is_ghost();
    let position = pet.pose.position;

    let distance = position.planar_distance(&target);
    if distance < config.reach_distance {
        retarget(pet, pick_target(rng, config, obstacles, height));
        return false;
    }

    let step = (config.speed * dt.as_secs_f32()).min(distance);
    let dx = (target.x - position.x) / distance * step;
    let dz = (target.z - position.z) / distance * step;
    let candidate = Vec3::new(position.x + dx, position.y, position.z + dz);

    let blocked = !ghost && is_blocked(obstacles, &candidate, config.pet_radius);
    let moved = if blocked {
        retarget(pet, pick_target(rng, config, obstacles, height));
        0.0
    } else {
        pet.pose.position = candidate;
        if step > 0.0 {
            pet.pose.angle = dx.atan2(dz);
        }
        step
    };

    if !ghost && !dt.is_zero() {
        let min_speed = config.stuck_displacement / REFERENCE_FRAME.as_secs_f32();
        if moved / dt.as_secs_f32() < min_speed {
            pet.stuck_for += dt;
        } else {
            pet.stuck_for = Duration::ZERO;
        }
        if pet.stuck_for > REFERENCE_FRAME * config.stuck_frames {
            debug!(pet = %id, stuck_ms = pet.stuck_for.as_millis() as u64, "Pet stuck, ghosting through obstacles");
            let target = pet.phase.target().unwrap_or(target);
            pet.phase = WanderPhase::Ghost {
                target,
                remaining: Duration::from_millis(config.ghost_ms),
            };
            pet.stuck_for = Duration::ZERO;
        }
    }

    !blocked && step > 0.0
}

/// New target, keeping an active ghost window
fn retarget(pet: &mut Pet, target: Vec3) {
    pet.phase = match pet.phase {
        WanderPhase::Ghost { remaining, .. } => WanderPhase::Ghost { target, remaining },
        WanderPhase::Idle | WanderPhase::Seeking { .. } => WanderPhase::Seeking { target },
    };
    pet.since_pick = Duration::ZERO;
}
