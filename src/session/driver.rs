use super::Session;
use crate::clock::Clock;
use crate::shared_state::AudioBackend;
use crate::transport::Transport;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Drive a session at a fixed frame rate until `shutdown` flips to true
/// or its sender is dropped. Returns the session for inspection.
pub async fn run_session<T, A, C>(
    mut session: Session<T, A, C>,
    frame_ms: u64,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<Session<T, A, C>>
where
    T: Transport,
    A: AudioBackend,
    C: Clock,
{
    anyhow::ensure!(frame_ms > 0, "frame_ms must be positive");
    let mut ticker = interval(Duration::from_millis(frame_ms));

    // Skip missed frames instead of bursting after a stall
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    session.start();
    info!(frame_ms = frame_ms, "Session started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = session.tick();
                if report.handled > 0 {
                    debug!(handled = report.handled, role = ?report.role, "Frame");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!(role = ?session.role(), "Session stopped");
    Ok(session)
}
