use super::*;
use serde_json::json;

fn snapshot(x: f32) -> EntitySnapshot {
    EntitySnapshot {
        entity_id: EntityId::new(),
        x,
        y: 0.0,
        z: 1.0,
        rotation: 0.5,
    }
}

#[test]
fn test_request_role_wire_shape() {
    let msg = ClientMessage::RequestAuthorityRole {
        group: GroupId::pets(),
    };
    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(value, json!({"type": "requestAuthorityRole", "group": "pets"}));
}

#[test]
fn test_role_granted_wire_shape() {
    let msg = ServerMessage::AuthorityRoleGranted {
        group: GroupId::pets(),
        is_authoritative: true,
    };
    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(
        value,
        json!({"type": "authorityRoleGranted", "group": "pets", "isAuthoritative": true})
    );
}

#[test]
fn test_state_change_wire_shape() {
    let speaker = EntityId::new();
    let msg = ClientMessage::StateChangeRequest {
        change: StateChange::PlaybackStarted {
            speaker_id: speaker,
            track: "lofi.mp3".to_string(),
            server_time: 1_700_000_000_000,
        },
    };
    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(value["type"], "stateChangeRequest");
    assert_eq!(value["change"]["kind"], "playbackStarted");
    assert_eq!(value["change"]["speakerId"], speaker.to_string());
    assert_eq!(value["change"]["serverTime"], 1_700_000_000_000i64);
}

#[test]
fn test_snapshot_batch_parses_from_json() {
    let id = EntityId::new();
    let text = json!({
        "type": "entitySnapshotBatch",
        "group": "pets",
        "timestamp": 1000,
        "snapshots": [{"entityId": id.to_string(), "x": 1.0, "y": 0.0, "z": -2.0, "rotation": 3.0}]
    })
    .to_string();

    let msg = decode_client_message(&text, 4096).unwrap();
    match msg {
        ClientMessage::EntitySnapshotBatch { snapshots, .. } => {
            assert_eq!(snapshots.len(), 1);
            assert_eq!(snapshots[0].entity_id, id);
            assert_eq!(snapshots[0].pose().position, Vec3::new(1.0, 0.0, -2.0));
        }
        other => panic!("Expected snapshot batch, got {:?}", other),
    }
}

#[test]
fn test_change_key_mapping() {
    let speaker = EntityId::new();
    let seat = EntityId::new();

    let paused = StateChange::SpeakerPaused {
        speaker_id: speaker,
        paused: true,
    };
    let volume = StateChange::SpeakerVolume {
        speaker_id: speaker,
        volume: 50.0,
    };
    let sit = StateChange::SeatOccupied {
        seat_id: seat,
        occupant: None,
    };

    assert_eq!(paused.key(), StateKey::SpeakerPaused(speaker));
    assert_eq!(volume.key(), StateKey::SpeakerVolume(speaker));
    assert_ne!(paused.key(), volume.key());
    assert_eq!(sit.key(), StateKey::Seat(seat));
}

#[test]
fn test_malformed_json_rejected() {
    let err = decode_client_message("{not json", 4096).unwrap_err();
    assert!(matches!(err, ValidationError::Malformed(_)));

    let err = decode_client_message(r#"{"type": "teleport"}"#, 4096).unwrap_err();
    assert!(matches!(err, ValidationError::Malformed(_)));
}

#[test]
fn test_oversized_frame_rejected() {
    let text = "x".repeat(100);
    let err = decode_client_message(&text, 10).unwrap_err();
    assert_eq!(err, ValidationError::TooLarge { size: 100, limit: 10 });
}

#[test]
fn test_non_finite_snapshot_rejected() {
    let msg = ClientMessage::EntitySnapshotBatch {
        group: GroupId::pets(),
        timestamp: 10,
        snapshots: vec![snapshot(1.0), snapshot(f32::NAN)],
    };
    assert_eq!(
        validate_client_message(&msg),
        Err(ValidationError::NonFiniteValue("position"))
    );
}

#[test]
fn test_oversized_batch_rejected() {
    let msg = ClientMessage::EntitySnapshotBatch {
        group: GroupId::pets(),
        timestamp: 10,
        snapshots: (0..MAX_SNAPSHOTS_PER_BATCH + 1).map(|i| snapshot(i as f32)).collect(),
    };
    assert_eq!(
        validate_client_message(&msg),
        Err(ValidationError::TooManySnapshots(MAX_SNAPSHOTS_PER_BATCH + 1))
    );
}

#[test]
fn test_empty_group_rejected() {
    let msg = ClientMessage::RequestAuthorityRole {
        group: GroupId::new(""),
    };
    assert_eq!(validate_client_message(&msg), Err(ValidationError::EmptyGroup));
}

#[test]
fn test_invalid_state_changes_rejected() {
    let speaker = EntityId::new();

    let nan_volume = ClientMessage::StateChangeRequest {
        change: StateChange::SpeakerVolume {
            speaker_id: speaker,
            volume: f32::INFINITY,
        },
    };
    assert_eq!(
        validate_client_message(&nan_volume),
        Err(ValidationError::NonFiniteValue("volume"))
    );

    let no_track = ClientMessage::StateChangeRequest {
        change: StateChange::PlaybackStarted {
            speaker_id: speaker,
            track: String::new(),
            server_time: 5,
        },
    };
    assert_eq!(validate_client_message(&no_track), Err(ValidationError::EmptyTrack));

    let bad_day = ClientMessage::StateChangeRequest {
        change: StateChange::WorldClock {
            phase: 0.5,
            server_time: 5,
            day_length_ms: 0,
        },
    };
    assert_eq!(
        validate_client_message(&bad_day),
        Err(ValidationError::InvalidDayLength(0))
    );
}

#[test]
fn test_out_of_range_volume_is_valid_on_the_wire() {
    // Clamping happens on the sending instance; the relay only rejects non-finite values
    let msg = ClientMessage::StateChangeRequest {
        change: StateChange::SpeakerVolume {
            speaker_id: EntityId::new(),
            volume: 150.0,
        },
    };
    assert!(validate_client_message(&msg).is_ok());
}
