use super::*;
use crate::config::RelayConfig;
use crate::entity::{EntityId, GroupId};
use crate::protocol::{ClientMessage, EntitySnapshot, ServerMessage, StateChange};
use tokio::sync::broadcast::error::TryRecvError;

fn hub() -> RelayHub {
    RelayHub::new(&RelayConfig::default())
}

fn drain_direct(conn: &mut RelayConnection) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = conn.direct.try_recv() {
        out.push(msg);
    }
    out
}

fn drain_fanout(conn: &mut RelayConnection) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    loop {
        match conn.fanout.try_recv() {
            Ok(msg) => out.push(msg),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    out
}

#[test]
fn test_connect_sends_welcome_first() {
    let hub = hub();
    let mut conn = hub.connect();

    let direct = drain_direct(&mut conn);
    assert_eq!(
        direct,
        vec![ServerMessage::Welcome {
            connection_id: conn.id
        }]
    );
    assert_eq!(hub.connection_count(), 1);
}

#[test]
fn test_role_request_answered_directly() {
    let hub = hub();
    let mut a = hub.connect();
    let mut b = hub.connect();
    drain_direct(&mut a);
    drain_direct(&mut b);

    let request = ClientMessage::RequestAuthorityRole {
        group: GroupId::pets(),
    };
    hub.handle_message(a.id, request.clone());
    hub.handle_message(b.id, request);

    assert_eq!(
        drain_direct(&mut a),
        vec![ServerMessage::AuthorityRoleGranted {
            group: GroupId::pets(),
            is_authoritative: true
        }]
    );
    assert_eq!(
        drain_direct(&mut b),
        vec![ServerMessage::AuthorityRoleGranted {
            group: GroupId::pets(),
            is_authoritative: false
        }]
    );
    // Grants are never fanned out
    assert!(drain_fanout(&mut a).is_empty());
}

#[test]
fn test_state_change_echoed_to_sender() {
    let hub = hub();
    let mut a = hub.connect();
    let mut b = hub.connect();

    let change = StateChange::SpeakerPaused {
        speaker_id: EntityId::new(),
        paused: true,
    };
    hub.handle_message(
        a.id,
        ClientMessage::StateChangeRequest {
            change: change.clone(),
        },
    );

    let expected = vec![ServerMessage::StateChangeApplied {
        from: Some(a.id),
        change,
    }];
    assert_eq!(drain_fanout(&mut a), expected);
    assert_eq!(drain_fanout(&mut b), expected);
}

#[test]
fn test_late_joiner_receives_replay() {
    let hub = hub();
    let a = hub.connect();
    let speaker = EntityId::new();

    let change = StateChange::SpeakerVolume {
        speaker_id: speaker,
        volume: 30.0,
    };
    hub.handle_message(
        a.id,
        ClientMessage::StateChangeRequest {
            change: change.clone(),
        },
    );

    let mut late = hub.connect();
    let direct = drain_direct(&mut late);
    assert_eq!(direct.len(), 2);
    assert_eq!(
        direct[1],
        ServerMessage::StateChangeApplied { from: None, change }
    );
}

#[test]
fn test_host_disconnect_frees_slot() {
    let hub = hub();
    let a = hub.connect();
    let mut b = hub.connect();
    let request = ClientMessage::RequestAuthorityRole {
        group: GroupId::pets(),
    };
    hub.handle_message(a.id, request.clone());
    hub.disconnect(a.id);

    assert!(hub.coordinator().host_of(&GroupId::pets()).is_none());

    drain_direct(&mut b);
    hub.handle_message(b.id, request);
    assert_eq!(
        drain_direct(&mut b),
        vec![ServerMessage::AuthorityRoleGranted {
            group: GroupId::pets(),
            is_authoritative: true
        }]
    );
}

#[test]
fn test_snapshot_publisher_adopted_when_vacant() {
    let hub = hub();
    let a = hub.connect();
    let b = hub.connect();

    let batch = ClientMessage::EntitySnapshotBatch {
        group: GroupId::pets(),
        timestamp: 1,
        snapshots: vec![EntitySnapshot {
            entity_id: EntityId::new(),
            x: 0.0,
            y: 0.0,
            z: 0.0,
            rotation: 0.0,
        }],
    };
    hub.handle_message(b.id, batch.clone());
    assert_eq!(hub.coordinator().host_of(&GroupId::pets()), Some(b.id));

    // A second publisher does not displace the adopted host
    hub.handle_message(a.id, batch);
    assert_eq!(hub.coordinator().host_of(&GroupId::pets()), Some(b.id));
}

#[test]
fn test_disconnect_releases_seats() {
    let hub = hub();
    let a = hub.connect();
    let mut b = hub.connect();
    let seat = EntityId::new();

    hub.handle_message(
        a.id,
        ClientMessage::StateChangeRequest {
            change: StateChange::SeatOccupied {
                seat_id: seat,
                occupant: Some(a.id),
            },
        },
    );
    drain_fanout(&mut b);

    hub.disconnect(a.id);

    assert_eq!(
        drain_fanout(&mut b),
        vec![ServerMessage::StateChangeApplied {
            from: None,
            change: StateChange::SeatOccupied {
                seat_id: seat,
                occupant: None
            }
        }]
    );
}

#[test]
fn test_store_cleared_when_room_empties() {
    let hub = hub();
    let a = hub.connect();
    hub.handle_message(
        a.id,
        ClientMessage::StateChangeRequest {
            change: StateChange::SpeakerPaused {
                speaker_id: EntityId::new(),
                paused: true,
            },
        },
    );
    assert_eq!(hub.store().len(), 1);

    hub.disconnect(a.id);
    assert!(hub.store().is_empty());
    assert_eq!(hub.connection_count(), 0);
}

#[test]
fn test_malformed_text_gets_error_reply() {
    let hub = hub();
    let mut a = hub.connect();
    drain_direct(&mut a);

    hub.handle_text(a.id, "{\"type\":\"nope\"}");

    let direct = drain_direct(&mut a);
    assert_eq!(direct.len(), 1);
    assert!(matches!(direct[0], ServerMessage::Error { .. }));
    // Rejected frames are not counted as relayed messages
    assert_eq!(hub.metrics.total_messages(), 0);
}

#[test]
fn test_status_reports_hosts() {
    let hub = hub();
    let a = hub.connect();
    hub.handle_message(
        a.id,
        ClientMessage::RequestAuthorityRole {
            group: GroupId::pets(),
        },
    );

    let status = hub.status();
    assert_eq!(status.connections, 1);
    assert_eq!(status.total_messages, 1);
    assert_eq!(status.hosts.get("pets"), Some(&a.id));
}

fn pause_request(speaker: EntityId, paused: bool) -> ClientMessage {
    ClientMessage::StateChangeRequest {
        change: StateChange::SpeakerPaused {
            speaker_id: speaker,
            paused,
        },
    }
}

#[tokio::test]
async fn test_replay_delivered_before_newer_live_change() {
    // Repeated: an unbiased select would interleave these at random
    for _ in 0..32 {
        let hub = hub();
        let speaker = EntityId::new();
        let a = hub.connect();
        hub.handle_message(a.id, pause_request(speaker, true));

        let mut late = hub.connect();
        hub.handle_message(a.id, pause_request(speaker, false));

        assert_eq!(
            late.next_outbound().await,
            Outbound::Send(ServerMessage::Welcome {
                connection_id: late.id
            })
        );
        assert_eq!(
            late.next_outbound().await,
            Outbound::Send(ServerMessage::StateChangeApplied {
                from: None,
                change: StateChange::SpeakerPaused {
                    speaker_id: speaker,
                    paused: true
                },
            })
        );
        assert_eq!(
            late.next_outbound().await,
            Outbound::Send(ServerMessage::StateChangeApplied {
                from: Some(a.id),
                change: StateChange::SpeakerPaused {
                    speaker_id: speaker,
                    paused: false
                },
            })
        );
    }
}

#[tokio::test]
async fn test_lagged_fanout_skips_and_continues() {
    let hub = RelayHub::new(&RelayConfig {
        broadcast_capacity: 1,
        ..RelayConfig::default()
    });
    let speaker = EntityId::new();
    let mut a = hub.connect();
    for paused in [true, false, true] {
        hub.handle_message(a.id, pause_request(speaker, paused));
    }

    assert!(matches!(
        a.next_outbound().await,
        Outbound::Send(ServerMessage::Welcome { .. })
    ));
    assert_eq!(a.next_outbound().await, Outbound::Lagged(2));
    assert_eq!(
        a.next_outbound().await,
        Outbound::Send(ServerMessage::StateChangeApplied {
            from: Some(a.id),
            change: StateChange::SpeakerPaused {
                speaker_id: speaker,
                paused: true
            },
        })
    );
}
