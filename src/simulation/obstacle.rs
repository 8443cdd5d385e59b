use crate::config::ObstacleSpec;
use crate::entity::Vec3;

/// Static footprint on the XZ plane. Collision treats it as the circle
/// that encloses the rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Obstacle {
    pub center: Vec3,
    pub half_width: f32,
    pub half_depth: f32,
}

impl Obstacle {
    pub fn new(x: f32, z: f32, half_width: f32, half_depth: f32) -> Self {
        Self {
            center: Vec3::new(x, 0.0, z),
            half_width: half_width.abs(),
            half_depth: half_depth.abs(),
        }
    }

    pub fn radius(&self) -> f32 {
        self.half_width.hypot(self.half_depth)
    }

    /// True if a body of `clearance` radius at `position` overlaps this obstacle
    pub fn blocks(&self, position: &Vec3, clearance: f32) -> bool {
        position.planar_distance(&self.center) < self.radius() + clearance
    }
}

impl From<&ObstacleSpec> for Obstacle {
    fn from(spec: &ObstacleSpec) -> Self {
        Obstacle::new(spec.x, spec.z, spec.half_width, spec.half_depth)
    }
}

pub fn is_blocked(obstacles: &[Obstacle], position: &Vec3, clearance: f32) -> bool {
    obstacles.iter().any(|o| o.blocks(position, clearance))
}
