// Observer-side smoothing of remotely driven entities

mod interpolation;
mod reconciler;


pub use interpolation::{normalize_angle, shortest_angle_delta, InterpolationState};
pub use reconciler::{EntityFrame, EntityReconciler};
