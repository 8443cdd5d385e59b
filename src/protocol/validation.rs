use super::{ClientMessage, StateChange};
use std::fmt;

/// Upper bound on snapshots carried by one batch
pub const MAX_SNAPSHOTS_PER_BATCH: usize = 256;

/// Validation errors for inbound client messages
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Malformed(String),
    TooLarge { size: usize, limit: usize },
    EmptyGroup,
    TooManySnapshots(usize),
    NonFiniteValue(&'static str),
    InvalidTimestamp(i64),
    EmptyTrack,
    InvalidDayLength(i64),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Malformed(e) => write!(f, "malformed message: {}", e),
            ValidationError::TooLarge { size, limit } => {
                write!(f, "message of {} bytes exceeds limit of {} bytes", size, limit)
            }
            ValidationError::EmptyGroup => write!(f, "group is required"),
            ValidationError::TooManySnapshots(n) => write!(
                f,
                "snapshot batch has {} entries, at most {} allowed",
                n, MAX_SNAPSHOTS_PER_BATCH
            ),
            ValidationError::NonFiniteValue(field) => {
                write!(f, "field '{}' must be a finite number", field)
            }
            ValidationError::InvalidTimestamp(ts) => {
                write!(f, "timestamp must be positive, got {}", ts)
            }
            ValidationError::EmptyTrack => write!(f, "track is required"),
            ValidationError::InvalidDayLength(ms) => {
                write!(f, "day length must be positive, got {}", ms)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Parse and validate one text frame from an instance.
pub fn decode_client_message(text: &str, limit: usize) -> Result<ClientMessage, ValidationError> {
    if text.len() > limit {
        return Err(ValidationError::TooLarge {
            size: text.len(),
            limit,
        });
    }

    let msg: ClientMessage =
        serde_json::from_str(text).map_err(|e| ValidationError::Malformed(e.to_string()))?;
    validate_client_message(&msg)?;
    Ok(msg)
}

/// Validation rules:
/// - Group names must be non-empty
/// - Snapshot coordinates and rotation must be finite; batches are bounded
/// - Timestamps must be positive (Unix epoch milliseconds)
/// - State changes must carry finite numbers and a non-empty track
pub fn validate_client_message(msg: &ClientMessage) -> Result<(), ValidationError> {
    match msg {
        ClientMessage::RequestAuthorityRole { group } => {
            if group.as_str().is_empty() {
                return Err(ValidationError::EmptyGroup);
            }
        }
        ClientMessage::EntitySnapshotBatch {
            group,
            timestamp,
            snapshots,
        } => {
            if group.as_str().is_empty() {
                return Err(ValidationError::EmptyGroup);
            }
            if *timestamp <= 0 {
                return Err(ValidationError::InvalidTimestamp(*timestamp));
            }
            if snapshots.len() > MAX_SNAPSHOTS_PER_BATCH {
                return Err(ValidationError::TooManySnapshots(snapshots.len()));
            }
            for snapshot in snapshots {
                if !snapshot.pose().position.is_finite() {
                    return Err(ValidationError::NonFiniteValue("position"));
                }
                if !snapshot.rotation.is_finite() {
                    return Err(ValidationError::NonFiniteValue("rotation"));
                }
            }
        }
        ClientMessage::StateChangeRequest { change } => validate_change(change)?,
    }

    Ok(())
}

/// Rules a single state change must satisfy before it is applied or relayed
pub fn validate_change(change: &StateChange) -> Result<(), ValidationError> {
    match change {
        StateChange::SpeakerPaused { .. } | StateChange::SeatOccupied { .. } => {}
        StateChange::SpeakerVolume { volume, .. } => {
            if !volume.is_finite() {
                return Err(ValidationError::NonFiniteValue("volume"));
            }
        }
        StateChange::PlaybackStarted {
            track, server_time, ..
        } => {
            if track.is_empty() {
                return Err(ValidationError::EmptyTrack);
            }
            if *server_time <= 0 {
                return Err(ValidationError::InvalidTimestamp(*server_time));
            }
        }
        StateChange::WorldClock {
            phase,
            server_time,
            day_length_ms,
        } => {
            if !phase.is_finite() {
                return Err(ValidationError::NonFiniteValue("phase"));
            }
            if *server_time <= 0 {
                return Err(ValidationError::InvalidTimestamp(*server_time));
            }
            if *day_length_ms <= 0 {
                return Err(ValidationError::InvalidDayLength(*day_length_ms));
            }
        }
    }

    Ok(())
}
