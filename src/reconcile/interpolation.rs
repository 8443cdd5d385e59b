use crate::entity::Pose;
use std::f32::consts::{PI, TAU};

/// Rotation differences below this snap to the target
const ANGLE_EPSILON: f32 = 1e-3;

/// Wrap an angle into (-π, π]
pub fn normalize_angle(angle: f32) -> f32 {
    let mut a = angle.rem_euclid(TAU);
    if a > PI {
        a -= TAU;
    }
    a
}

/// Signed rotation from `from` to `to` along the short way round, in (-π, π]
pub fn shortest_angle_delta(from: f32, to: f32) -> f32 {
    normalize_angle(normalize_angle(to) - normalize_angle(from))
}

/// Visual state of one entity this instance does not simulate.
///
/// Each step closes a fixed fraction of the remaining gap (exponential
/// decay), so convergence speed depends on frame rate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InterpolationState {
    pub current: Pose,
    pub target: Pose,
    pub rate: f32,
}

impl InterpolationState {
    /// Start at rest on `pose`
    pub fn at(pose: Pose, rate: f32) -> Self {
        Self {
            current: pose,
            target: pose,
            rate,
        }
    }

    pub fn set_target(&mut self, target: Pose) {
        self.target = target;
    }

    /// Advance one frame. Returns true if the position or the facing moved.
    pub fn step(&mut self, epsilon: f32) -> bool {
        let translating = if self.current.position.distance(&self.target.position) < epsilon {
            self.current.position = self.target.position;
            false
        } else {
            self.current.position = self.current.position.lerp(&self.target.position, self.rate);
            true
        };

        let delta = shortest_angle_delta(self.current.angle, self.target.angle);
        let rotating = delta.abs() >= ANGLE_EPSILON;
        self.current.angle = if rotating {
            normalize_angle(self.current.angle + delta * self.rate)
        } else {
            normalize_angle(self.target.angle)
        };

        translating || rotating
    }
}
