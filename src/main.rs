use anyhow::{Context, Result};
use roomsync::config::{load_config, RoomConfig};
use roomsync::relay::{create_relay_router, RelayHub};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomsync=info".into()),
        )
        .init();

    info!("Roomsync relay starting...");

    // Config path from the first argument or ROOMSYNC_CONFIG; defaults otherwise
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("ROOMSYNC_CONFIG").ok());
    let config = match &config_path {
        Some(path) => load_config(path)?,
        None => RoomConfig::default(),
    };
    let relay_config = config.relay.with_env();

    info!(
        config_path = config_path.as_deref().unwrap_or("<defaults>"),
        bind_addr = %relay_config.bind_addr,
        max_message_bytes = relay_config.max_message_bytes,
        broadcast_capacity = relay_config.broadcast_capacity,
        "Configuration loaded"
    );

    let hub = Arc::new(RelayHub::new(&relay_config));
    let router = create_relay_router(Arc::clone(&hub));

    let listener = tokio::net::TcpListener::bind(&relay_config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind relay address '{}'", relay_config.bind_addr))?;
    info!(addr = %relay_config.bind_addr, "Relay listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "Relay server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    let status = hub.status();
    info!(
        connections = status.connections,
        total_messages = status.total_messages,
        "Relay stopped"
    );

    Ok(())
}
