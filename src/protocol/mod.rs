// Wire protocol between instances and the relay (JSON text frames)

mod validation;
#[cfg(test)]
mod tests;

pub use validation::{
    decode_client_message, validate_change, validate_client_message, ValidationError,
    MAX_SNAPSHOTS_PER_BATCH,
};

use crate::entity::{ConnectionId, EntityId, GroupId, Pose, Vec3};
use serde::{Deserialize, Serialize};

/// One authoritative pose sample for an autonomous entity
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySnapshot {
    pub entity_id: EntityId,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub rotation: f32,
}

impl EntitySnapshot {
    pub fn new(entity_id: EntityId, pose: Pose) -> Self {
        Self {
            entity_id,
            x: pose.position.x,
            y: pose.position.y,
            z: pose.position.z,
            rotation: pose.angle,
        }
    }

    pub fn pose(&self) -> Pose {
        Pose::new(Vec3::new(self.x, self.y, self.z), self.rotation)
    }
}

/// A discrete change to mirrored session state.
///
/// Every variant maps to exactly one [`StateKey`]; applying the same change
/// twice has the same effect as applying it once.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StateChange {
    SpeakerPaused {
        speaker_id: EntityId,
        paused: bool,
    },
    /// Base volume in [0, 100]; spatial and master factors never travel
    SpeakerVolume {
        speaker_id: EntityId,
        volume: f32,
    },
    /// Playback began at `server_time` on the sender's clock
    PlaybackStarted {
        speaker_id: EntityId,
        track: String,
        server_time: i64,
    },
    /// Day-night phase in [0, 1) as of `server_time`
    WorldClock {
        phase: f64,
        server_time: i64,
        day_length_ms: i64,
    },
    SeatOccupied {
        seat_id: EntityId,
        occupant: Option<ConnectionId>,
    },
}

impl StateChange {
    pub fn key(&self) -> StateKey {
        match self {
            StateChange::SpeakerPaused { speaker_id, .. } => StateKey::SpeakerPaused(*speaker_id),
            StateChange::SpeakerVolume { speaker_id, .. } => StateKey::SpeakerVolume(*speaker_id),
            StateChange::PlaybackStarted { speaker_id, .. } => {
                StateKey::SpeakerPlayback(*speaker_id)
            }
            StateChange::WorldClock { .. } => StateKey::WorldClock,
            StateChange::SeatOccupied { seat_id, .. } => StateKey::Seat(*seat_id),
        }
    }
}

/// Identity of one mirrored value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StateKey {
    SpeakerPaused(EntityId),
    SpeakerVolume(EntityId),
    SpeakerPlayback(EntityId),
    WorldClock,
    Seat(EntityId),
}

/// Instance → relay
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    RequestAuthorityRole {
        group: GroupId,
    },
    EntitySnapshotBatch {
        group: GroupId,
        timestamp: i64,
        snapshots: Vec<EntitySnapshot>,
    },
    StateChangeRequest {
        change: StateChange,
    },
}

impl ClientMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::RequestAuthorityRole { .. } => "requestAuthorityRole",
            ClientMessage::EntitySnapshotBatch { .. } => "entitySnapshotBatch",
            ClientMessage::StateChangeRequest { .. } => "stateChangeRequest",
        }
    }
}

/// Relay → instance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Welcome {
        connection_id: ConnectionId,
    },
    AuthorityRoleGranted {
        group: GroupId,
        is_authoritative: bool,
    },
    EntitySnapshotBatch {
        from: ConnectionId,
        group: GroupId,
        timestamp: i64,
        snapshots: Vec<EntitySnapshot>,
    },
    /// Mirrored change, echoed to every instance including the sender.
    /// `from` is `None` for relay-originated changes (seat release on disconnect).
    StateChangeApplied {
        from: Option<ConnectionId>,
        change: StateChange,
    },
    Error {
        error: String,
    },
}

impl ServerMessage {
    pub fn error(error: impl Into<String>) -> Self {
        ServerMessage::Error {
            error: error.into(),
        }
    }
}
