// Wander simulation run by the authoritative instance

mod obstacle;
mod wander;


pub use obstacle::{is_blocked, Obstacle};
pub use wander::{LocalSimulator, Pet, WanderPhase, REFERENCE_FRAME};
