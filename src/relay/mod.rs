// Relay and role coordinator for connected instances

mod connection;
mod coordinator;
mod hub;
mod metrics;
mod store;
mod websocket;

#[cfg(test)]
mod tests;

pub use connection::ConnectionManager;
pub use coordinator::Coordinator;
pub use hub::{Outbound, RelayConnection, RelayHub, RelayStatus};
pub use metrics::{MetricsSnapshot, RelayMetrics};
pub use store::SessionStore;
pub use websocket::{create_relay_router, ws_handler};
