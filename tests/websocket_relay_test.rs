//! Relay behaviour over a real WebSocket connection

use futures::{SinkExt, StreamExt};
use roomsync::config::RelayConfig;
use roomsync::entity::{ConnectionId, EntityId, GroupId};
use roomsync::protocol::{ClientMessage, ServerMessage, StateChange};
use roomsync::relay::{create_relay_router, RelayHub};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_relay() -> (Arc<RelayHub>, String) {
    let hub = Arc::new(RelayHub::new(&RelayConfig::default()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = create_relay_router(Arc::clone(&hub));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (hub, format!("ws://{}/ws", addr))
}

async fn connect(url: &str) -> (Client, ConnectionId) {
    let (mut ws, _) = connect_async(url).await.unwrap();
    match next_message(&mut ws).await {
        ServerMessage::Welcome { connection_id } => (ws, connection_id),
        other => panic!("expected welcome, got {:?}", other),
    }
}

async fn next_frame(ws: &mut Client) -> Message {
    tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("socket closed")
        .expect("websocket error")
}

async fn next_message(ws: &mut Client) -> ServerMessage {
    loop {
        if let Message::Text(text) = next_frame(ws).await {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn send(ws: &mut Client, msg: &ClientMessage) {
    let json = serde_json::to_string(msg).unwrap();
    ws.send(Message::Text(json)).await.unwrap();
}

async fn wait_for_connections(hub: &RelayHub, expected: u64) {
    for _ in 0..200 {
        if hub.status().connections == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("relay never reached {} connections", expected);
}

fn role_request() -> ClientMessage {
    ClientMessage::RequestAuthorityRole {
        group: GroupId::pets(),
    }
}

#[tokio::test]
async fn test_socket_role_grant_and_echo() {
    let (hub, url) = start_relay().await;
    let (mut ws, id) = connect(&url).await;

    send(&mut ws, &role_request()).await;
    assert_eq!(
        next_message(&mut ws).await,
        ServerMessage::AuthorityRoleGranted {
            group: GroupId::pets(),
            is_authoritative: true
        }
    );

    let change = StateChange::SpeakerPaused {
        speaker_id: EntityId::new(),
        paused: true,
    };
    send(
        &mut ws,
        &ClientMessage::StateChangeRequest {
            change: change.clone(),
        },
    )
    .await;
    assert_eq!(
        next_message(&mut ws).await,
        ServerMessage::StateChangeApplied {
            from: Some(id),
            change
        }
    );
    assert_eq!(hub.status().hosts.get("pets"), Some(&id));
}

#[tokio::test]
async fn test_socket_malformed_frame_keeps_connection_open() {
    let (_hub, url) = start_relay().await;
    let (mut ws, _) = connect(&url).await;

    ws.send(Message::Text("not json".to_string())).await.unwrap();
    assert!(matches!(
        next_message(&mut ws).await,
        ServerMessage::Error { .. }
    ));

    send(&mut ws, &role_request()).await;
    assert!(matches!(
        next_message(&mut ws).await,
        ServerMessage::AuthorityRoleGranted { .. }
    ));
}

#[tokio::test]
async fn test_socket_ping_answered_with_pong() {
    let (_hub, url) = start_relay().await;
    let (mut ws, _) = connect(&url).await;

    ws.send(Message::Ping(vec![7, 7])).await.unwrap();
    loop {
        match next_frame(&mut ws).await {
            Message::Pong(data) => {
                assert_eq!(data, vec![7, 7]);
                break;
            }
            Message::Text(_) => continue,
            other => panic!("unexpected frame {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_socket_replay_follows_welcome() {
    let (_hub, url) = start_relay().await;
    let (mut first, _) = connect(&url).await;

    let change = StateChange::SpeakerVolume {
        speaker_id: EntityId::new(),
        volume: 40.0,
    };
    send(
        &mut first,
        &ClientMessage::StateChangeRequest {
            change: change.clone(),
        },
    )
    .await;
    // Echo means the relay has stored it
    next_message(&mut first).await;

    let (mut late, _) = connect(&url).await;
    assert_eq!(
        next_message(&mut late).await,
        ServerMessage::StateChangeApplied {
            from: None,
            change
        }
    );
}

#[tokio::test]
async fn test_socket_close_frees_host_and_releases_seat() {
    let (hub, url) = start_relay().await;
    let (mut host, host_id) = connect(&url).await;
    let (mut peer, _) = connect(&url).await;

    send(&mut host, &role_request()).await;
    next_message(&mut host).await;

    let seat = EntityId::new();
    send(
        &mut host,
        &ClientMessage::StateChangeRequest {
            change: StateChange::SeatOccupied {
                seat_id: seat,
                occupant: Some(host_id),
            },
        },
    )
    .await;
    assert!(matches!(
        next_message(&mut peer).await,
        ServerMessage::StateChangeApplied { from: Some(from), .. } if from == host_id
    ));

    host.close(None).await.unwrap();
    wait_for_connections(&hub, 1).await;

    assert_eq!(
        next_message(&mut peer).await,
        ServerMessage::StateChangeApplied {
            from: None,
            change: StateChange::SeatOccupied {
                seat_id: seat,
                occupant: None
            },
        }
    );
    assert!(hub.status().hosts.is_empty());

    // The freed slot goes to the next requester
    send(&mut peer, &role_request()).await;
    assert_eq!(
        next_message(&mut peer).await,
        ServerMessage::AuthorityRoleGranted {
            group: GroupId::pets(),
            is_authoritative: true
        }
    );
}
