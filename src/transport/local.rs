use super::{Transport, TransportError};
use crate::config::RelayConfig;
use crate::entity::ConnectionId;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::relay::{RelayConnection, RelayHub};
use std::sync::Arc;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::mpsc;
use tracing::warn;

/// In-process relay. Runs the same hub as the WebSocket server, with every
/// message passed through the JSON wire encoding.
#[derive(Clone)]
pub struct LocalRelay {
    hub: Arc<RelayHub>,
}

impl LocalRelay {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            hub: Arc::new(RelayHub::new(config)),
        }
    }

    pub fn from_hub(hub: Arc<RelayHub>) -> Self {
        Self { hub }
    }

    /// Open a new connection
    pub fn connect(&self) -> LocalTransport {
        let conn = self.hub.connect();
        LocalTransport {
            hub: Arc::clone(&self.hub),
            id: conn.id,
            conn: Some(conn),
        }
    }

    pub fn hub(&self) -> &Arc<RelayHub> {
        &self.hub
    }
}

impl Default for LocalRelay {
    fn default() -> Self {
        Self::new(&RelayConfig::default())
    }
}

/// One instance's connection to a [`LocalRelay`]
pub struct LocalTransport {
    hub: Arc<RelayHub>,
    id: ConnectionId,
    conn: Option<RelayConnection>,
}

impl LocalTransport {
    pub fn connection_id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Drop the connection without any goodbye, as a crashed tab would
    pub fn disconnect(&mut self) {
        if self.conn.take().is_some() {
            self.hub.disconnect(self.id);
        }
    }
}

impl Transport for LocalTransport {
    fn send(&mut self, msg: ClientMessage) -> Result<(), TransportError> {
        if self.conn.is_none() {
            return Err(TransportError::Disconnected);
        }
        let text = serde_json::to_string(&msg).map_err(|e| TransportError::Encode(e.to_string()))?;
        self.hub.handle_text(self.id, &text);
        Ok(())
    }

    fn try_recv(&mut self) -> Option<ServerMessage> {
        let conn = self.conn.as_mut()?;

        let msg = match conn.direct.try_recv() {
            Ok(msg) => msg,
            Err(mpsc::error::TryRecvError::Empty | mpsc::error::TryRecvError::Disconnected) => {
                loop {
                    match conn.fanout.try_recv() {
                        Ok(msg) => break msg,
                        Err(TryRecvError::Lagged(skipped)) => {
                            warn!(connection_id = %self.id, skipped = skipped, "Local transport lagged, skipped messages");
                        }
                        Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
                    }
                }
            }
        };

        // Round-trip through the wire format like a real socket would
        match serde_json::to_string(&msg).and_then(|text| serde_json::from_str(&text)) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(connection_id = %self.id, error = %e, "Dropping undecodable message");
                None
            }
        }
    }
}

impl Drop for LocalTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}
