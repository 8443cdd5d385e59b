pub mod env;

use crate::entity::{EntityId, Vec3};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete room configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RoomConfig {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub authority: AuthorityConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub wander: WanderConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub world_clock: WorldClockConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
}

/// Relay server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Fan-out channel capacity; slow connections past this lag and skip messages
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
    /// Sliding window for the status endpoint's message rate (seconds)
    #[serde(default = "default_rate_window")]
    pub rate_window_seconds: i64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_broadcast_capacity() -> usize {
    1024
}

fn default_max_message_bytes() -> usize {
    65_536
}

fn default_rate_window() -> i64 {
    5
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            broadcast_capacity: default_broadcast_capacity(),
            max_message_bytes: default_max_message_bytes(),
            rate_window_seconds: default_rate_window(),
        }
    }
}

/// Host election and snapshot cadence
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthorityConfig {
    #[serde(default = "default_publish_interval")]
    pub publish_interval_ms: u64,
    /// Silence after which an observer takes over the group
    #[serde(default = "default_liveness_threshold")]
    pub liveness_threshold_ms: u64,
    #[serde(default = "default_role_request_timeout")]
    pub role_request_timeout_ms: u64,
}

fn default_publish_interval() -> u64 {
    100
}

fn default_liveness_threshold() -> u64 {
    5_000
}

fn default_role_request_timeout() -> u64 {
    3_000
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            publish_interval_ms: default_publish_interval(),
            liveness_threshold_ms: default_liveness_threshold(),
            role_request_timeout_ms: default_role_request_timeout(),
        }
    }
}

/// Observer-side interpolation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconcileConfig {
    #[serde(default = "default_lerp_factor")]
    pub lerp_factor: f32,
    #[serde(default = "default_snap_epsilon")]
    pub snap_epsilon: f32,
}

fn default_lerp_factor() -> f32 {
    0.15
}

fn default_snap_epsilon() -> f32 {
    0.01
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            lerp_factor: default_lerp_factor(),
            snap_epsilon: default_snap_epsilon(),
        }
    }
}

/// Pet wander behaviour (authoritative instance only)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WanderConfig {
    #[serde(default = "default_wander_interval")]
    pub interval_ms: u64,
    #[serde(default = "default_reach_distance")]
    pub reach_distance: f32,
    /// Stuck window, in 16ms reference frames
    #[serde(default = "default_stuck_frames")]
    pub stuck_frames: u32,
    /// Displacement per 16ms reference frame below which a seeking pet counts
    /// as not moving. Scaled to the actual frame time.
    #[serde(default = "default_stuck_displacement")]
    pub stuck_displacement: f32,
    #[serde(default = "default_ghost_ms")]
    pub ghost_ms: u64,
    /// Units per second
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default = "default_pet_radius")]
    pub pet_radius: f32,
    #[serde(default = "default_min_bound")]
    pub min_x: f32,
    #[serde(default = "default_max_bound")]
    pub max_x: f32,
    #[serde(default = "default_min_bound")]
    pub min_z: f32,
    #[serde(default = "default_max_bound")]
    pub max_z: f32,
}

fn default_wander_interval() -> u64 {
    3_000
}

fn default_reach_distance() -> f32 {
    0.5
}

fn default_stuck_frames() -> u32 {
    120
}

fn default_stuck_displacement() -> f32 {
    0.01
}

fn default_ghost_ms() -> u64 {
    3_000
}

fn default_speed() -> f32 {
    1.5
}

fn default_pet_radius() -> f32 {
    0.4
}

fn default_min_bound() -> f32 {
    -10.0
}

fn default_max_bound() -> f32 {
    10.0
}

impl Default for WanderConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_wander_interval(),
            reach_distance: default_reach_distance(),
            stuck_frames: default_stuck_frames(),
            stuck_displacement: default_stuck_displacement(),
            ghost_ms: default_ghost_ms(),
            speed: default_speed(),
            pet_radius: default_pet_radius(),
            min_x: default_min_bound(),
            max_x: default_max_bound(),
            min_z: default_min_bound(),
            max_z: default_max_bound(),
        }
    }
}

/// Speaker playback and volume
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaybackConfig {
    /// Wait between attempts to pair a start event with a not-yet-loaded speaker
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: i64,
    /// Total time a start event may wait for its speaker before it is dropped
    #[serde(default = "default_retry_budget")]
    pub retry_budget_ms: i64,
    #[serde(default = "default_falloff_distance")]
    pub falloff_distance: f32,
    #[serde(default = "default_master_volume")]
    pub master_volume: f32,
}

fn default_retry_backoff() -> i64 {
    1_000
}

fn default_retry_budget() -> i64 {
    30_000
}

fn default_falloff_distance() -> f32 {
    15.0
}

fn default_master_volume() -> f32 {
    1.0
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            retry_backoff_ms: default_retry_backoff(),
            retry_budget_ms: default_retry_budget(),
            falloff_distance: default_falloff_distance(),
            master_volume: default_master_volume(),
        }
    }
}

/// Day-night cycle sync
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorldClockConfig {
    #[serde(default = "default_day_length")]
    pub day_length_ms: i64,
    #[serde(default = "default_sync_interval")]
    pub sync_interval_ms: u64,
}

fn default_day_length() -> i64 {
    20 * 60 * 1000
}

fn default_sync_interval() -> u64 {
    10_000
}

impl Default for WorldClockConfig {
    fn default() -> Self {
        Self {
            day_length_ms: default_day_length(),
            sync_interval_ms: default_sync_interval(),
        }
    }
}

/// Instance-side driver
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default = "default_frame_ms")]
    pub frame_ms: u64,
}

fn default_frame_ms() -> u64 {
    16
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_ms: default_frame_ms(),
        }
    }
}

/// Initial room layout: pets spawned by whoever first becomes authoritative,
/// static obstacles the wander AI steers around, and the speakers and seats
/// whose state is mirrored between instances.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LayoutConfig {
    #[serde(default)]
    pub pets: Vec<PetSpawn>,
    #[serde(default)]
    pub obstacles: Vec<ObstacleSpec>,
    #[serde(default)]
    pub speakers: Vec<SpeakerSpec>,
    #[serde(default)]
    pub seats: Vec<SeatSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PetSpawn {
    /// Optional stable id; a fresh one is generated when omitted
    #[serde(default)]
    pub id: Option<EntityId>,
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    pub z: f32,
}

impl PetSpawn {
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObstacleSpec {
    pub x: f32,
    pub z: f32,
    pub half_width: f32,
    pub half_depth: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpeakerSpec {
    pub id: EntityId,
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    pub z: f32,
}

impl SpeakerSpec {
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SeatSpec {
    pub id: EntityId,
}

/// Load configuration from TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<RoomConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    let config: RoomConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
    Ok(config)
}
