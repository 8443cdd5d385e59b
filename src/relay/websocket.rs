use crate::relay::connection::ConnectionManager;
use crate::relay::hub::RelayHub;
use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Create the relay router: `/ws` for instances, `/api/status` for operators
pub fn create_relay_router(hub: Arc<RelayHub>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/status", get(status_handler))
        .layer(CorsLayer::permissive())
        .with_state(hub)
}

/// GET /ws - WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<Arc<RelayHub>>) -> Response {
    info!("WebSocket upgrade request received");
    ws.on_upgrade(|socket| ConnectionManager::new(hub).handle(socket))
}

/// GET /api/status - connection count, throughput and current hosts
async fn status_handler(State(hub): State<Arc<RelayHub>>) -> Response {
    Json(hub.status()).into_response()
}
