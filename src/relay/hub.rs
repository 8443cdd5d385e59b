use crate::config::RelayConfig;
use crate::entity::ConnectionId;
use crate::protocol::{decode_client_message, ClientMessage, ServerMessage};
use crate::relay::coordinator::Coordinator;
use crate::relay::metrics::RelayMetrics;
use crate::relay::store::SessionStore;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Receiving half of one relay connection.
///
/// `direct` carries unicast replies (welcome, role grants, session replay,
/// errors); `fanout` carries messages relayed to every connection.
pub struct RelayConnection {
    pub id: ConnectionId,
    pub direct: mpsc::UnboundedReceiver<ServerMessage>,
    pub fanout: broadcast::Receiver<ServerMessage>,
}

/// Next thing a connection task has to deliver
#[derive(Debug, PartialEq)]
pub enum Outbound {
    Send(ServerMessage),
    /// The fanout receiver fell behind and dropped this many messages
    Lagged(u64),
    Closed,
}

impl RelayConnection {
    /// Wait for the next outbound message. The direct channel always drains
    /// before fanout, so a replayed value never lands after a newer live one.
    /// Cancel safe.
    pub async fn next_outbound(&mut self) -> Outbound {
        tokio::select! {
            biased;

            Some(msg) = self.direct.recv() => Outbound::Send(msg),

            result = self.fanout.recv() => match result {
                Ok(msg) => Outbound::Send(msg),
                Err(broadcast::error::RecvError::Lagged(skipped)) => Outbound::Lagged(skipped),
                Err(broadcast::error::RecvError::Closed) => Outbound::Closed,
            },
        }
    }
}

/// Central relay: fans messages out to every connection (the sender included),
/// answers role requests and remembers the latest session state for late joiners.
///
/// Transport-agnostic; the WebSocket handler and the in-process transport both
/// drive it.
pub struct RelayHub {
    fanout_tx: broadcast::Sender<ServerMessage>,
    connections: DashMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>,
    coordinator: Coordinator,
    store: SessionStore,
    pub metrics: RelayMetrics,
    max_message_bytes: usize,
}

impl RelayHub {
    pub fn new(config: &RelayConfig) -> Self {
        let (fanout_tx, _) = broadcast::channel(config.broadcast_capacity.max(1));

        Self {
            fanout_tx,
            connections: DashMap::new(),
            coordinator: Coordinator::new(),
            store: SessionStore::new(),
            metrics: RelayMetrics::new(config.rate_window_seconds),
            max_message_bytes: config.max_message_bytes,
        }
    }

    /// Register a new connection. It receives `welcome` followed by a replay
    /// of the current session state before anything else on its direct channel.
    pub fn connect(&self) -> RelayConnection {
        let id = ConnectionId::new();

        // Subscribe before replaying so nothing published in between is missed
        let fanout = self.fanout_tx.subscribe();
        let (direct_tx, direct) = mpsc::unbounded_channel();

        let _ = direct_tx.send(ServerMessage::Welcome { connection_id: id });
        let replay = self.store.replay();
        let replayed = replay.len();
        for change in replay {
            let _ = direct_tx.send(ServerMessage::StateChangeApplied { from: None, change });
        }

        self.connections.insert(id, direct_tx);
        self.metrics.increment_connections();

        info!(connection_id = %id, replayed = replayed, "Instance connected");

        RelayConnection { id, direct, fanout }
    }

    /// Tear down a connection: free its host slots and release its seats.
    pub fn disconnect(&self, id: ConnectionId) {
        if self.connections.remove(&id).is_none() {
            return;
        }
        self.metrics.decrement_connections();

        for group in self.coordinator.release(id) {
            // No demotion or handoff message: observers take over on silence
            info!(connection_id = %id, group = %group, "Host left, slot freed");
        }

        if self.connections.is_empty() {
            self.store.clear();
        } else {
            for change in self.store.release_seats(id) {
                debug!(connection_id = %id, "Releasing seat held by departed instance");
                self.broadcast(ServerMessage::StateChangeApplied { from: None, change });
            }
        }

        info!(connection_id = %id, "Instance disconnected");
    }

    /// Decode one text frame and handle it; malformed frames get an error reply
    pub fn handle_text(&self, from: ConnectionId, text: &str) {
        match decode_client_message(text, self.max_message_bytes) {
            Ok(msg) => self.handle_message(from, msg),
            Err(e) => {
                warn!(connection_id = %from, error = %e, "Rejected client message");
                self.send_direct(from, ServerMessage::error(e.to_string()));
            }
        }
    }

    pub fn handle_message(&self, from: ConnectionId, msg: ClientMessage) {
        self.metrics.record_message();
        debug!(connection_id = %from, kind = msg.kind(), "Client message");

        match msg {
            ClientMessage::RequestAuthorityRole { group } => {
                let is_authoritative = self.coordinator.request_role(&group, from);
                info!(
                    connection_id = %from,
                    group = %group,
                    is_authoritative = is_authoritative,
                    "Authority role granted"
                );
                self.send_direct(
                    from,
                    ServerMessage::AuthorityRoleGranted {
                        group,
                        is_authoritative,
                    },
                );
            }
            ClientMessage::EntitySnapshotBatch {
                group,
                timestamp,
                snapshots,
            } => {
                if self.coordinator.adopt_if_vacant(&group, from) {
                    info!(
                        connection_id = %from,
                        group = %group,
                        "Adopted snapshot publisher as host"
                    );
                }
                self.broadcast(ServerMessage::EntitySnapshotBatch {
                    from,
                    group,
                    timestamp,
                    snapshots,
                });
            }
            ClientMessage::StateChangeRequest { change } => {
                self.store.record(&change);
                self.broadcast(ServerMessage::StateChangeApplied {
                    from: Some(from),
                    change,
                });
            }
        }
    }

    fn broadcast(&self, msg: ServerMessage) {
        // No receivers is fine (empty room)
        let _ = self.fanout_tx.send(msg);
    }

    fn send_direct(&self, to: ConnectionId, msg: ServerMessage) {
        if let Some(tx) = self.connections.get(&to) {
            if tx.send(msg).is_err() {
                debug!(connection_id = %to, "Direct channel closed");
            }
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn status(&self) -> RelayStatus {
        let metrics = self.metrics.get_snapshot();
        RelayStatus {
            connections: metrics.connections,
            total_messages: metrics.total_messages,
            message_rate: metrics.message_rate,
            hosts: self.coordinator.hosts(),
            session_keys: self.store.len(),
        }
    }
}

/// Body of `GET /api/status`
#[derive(Debug, Clone, Serialize)]
pub struct RelayStatus {
    pub connections: u64,
    pub total_messages: u64,
    pub message_rate: f64,
    pub hosts: BTreeMap<String, ConnectionId>,
    pub session_keys: usize,
}
