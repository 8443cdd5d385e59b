use crate::protocol::ServerMessage;
use crate::relay::hub::{Outbound, RelayHub};
use axum::extract::ws::{Message, WebSocket};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Drives a single WebSocket connection against the hub
pub struct ConnectionManager {
    hub: Arc<RelayHub>,
}

impl ConnectionManager {
    pub fn new(hub: Arc<RelayHub>) -> Self {
        Self { hub }
    }

    /// Handle WebSocket connection lifecycle
    pub async fn handle(self, mut socket: WebSocket) {
        let mut conn = self.hub.connect();
        let id = conn.id;

        info!(connection_id = %id, "WebSocket connection established");

        loop {
            tokio::select! {
                // Frames from the instance
                msg = socket.recv() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.hub.handle_text(id, &text);
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            info!(connection_id = %id, "WebSocket client disconnected");
                            break;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = socket.send(Message::Pong(data)).await {
                                error!(connection_id = %id, error = %e, "Failed to send pong");
                                break;
                            }
                        }
                        Some(Ok(_)) => {
                            // Ignore binary, pong messages
                        }
                        Some(Err(e)) => {
                            warn!(connection_id = %id, error = %e, "WebSocket error");
                            break;
                        }
                    }
                }

                // Unicast replies first, then relayed messages
                outbound = conn.next_outbound() => {
                    match outbound {
                        Outbound::Send(msg) => {
                            if let Err(e) = send_message(&mut socket, &msg).await {
                                error!(connection_id = %id, error = %e, "Failed to send message");
                                break;
                            }
                        }
                        Outbound::Lagged(skipped) => {
                            // Best-effort channel: drop and carry on
                            warn!(connection_id = %id, skipped = skipped, "WebSocket lagged, skipped messages");
                        }
                        Outbound::Closed => {
                            error!(connection_id = %id, "Relay broadcast channel closed");
                            break;
                        }
                    }
                }
            }
        }

        self.hub.disconnect(id);
        info!(connection_id = %id, "WebSocket connection closed");
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> anyhow::Result<()> {
    let json = serde_json::to_string(msg)?;
    socket.send(Message::Text(json)).await?;
    Ok(())
}
