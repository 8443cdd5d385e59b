/// Default base volume for a speaker nobody has adjusted yet
pub const DEFAULT_VOLUME: f32 = 100.0;

/// Clamp a requested base volume into [0, 100]. Non-finite input is treated as 0.
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_finite() {
        volume.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Quadratic distance attenuation, 1 at the source and 0 at `falloff_distance`
pub fn spatial_falloff(distance: f32, falloff_distance: f32) -> f32 {
    if falloff_distance <= 0.0 || !distance.is_finite() {
        return 0.0;
    }
    let linear = (1.0 - distance / falloff_distance).clamp(0.0, 1.0);
    linear * linear
}

/// Gain handed to the audio backend. Only `base_volume` is ever mirrored;
/// the spatial and master factors are recomputed locally every frame.
pub fn effective_gain(base_volume: f32, distance: f32, falloff_distance: f32, master: f32) -> f32 {
    (clamp_volume(base_volume) / 100.0) * spatial_falloff(distance, falloff_distance) * master.max(0.0)
}
