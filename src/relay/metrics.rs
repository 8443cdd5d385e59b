use chrono::Utc;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Tracks relay throughput and connection counts
#[derive(Clone)]
pub struct RelayMetrics {
    /// Total client messages relayed (lifetime counter)
    total_messages: Arc<AtomicU64>,

    /// Message timestamps for rate calculation (sliding window)
    message_timestamps: Arc<Mutex<VecDeque<i64>>>,

    /// Sliding window length in milliseconds
    window_ms: i64,

    /// Open WebSocket / local connections
    connections: Arc<AtomicU64>,
}

impl RelayMetrics {
    pub fn new(window_seconds: i64) -> Self {
        Self {
            total_messages: Arc::new(AtomicU64::new(0)),
            message_timestamps: Arc::new(Mutex::new(VecDeque::new())),
            window_ms: window_seconds.max(1) * 1000,
            connections: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record one inbound client message
    pub fn record_message(&self) {
        self.record_message_at(Utc::now().timestamp_millis());
    }

    fn record_message_at(&self, now: i64) {
        self.total_messages.fetch_add(1, Ordering::Relaxed);

        let mut timestamps = self
            .message_timestamps
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        timestamps.push_back(now);
        prune(&mut timestamps, now, self.window_ms);
    }

    /// Messages per second over the sliding window
    pub fn message_rate(&self) -> f64 {
        self.message_rate_at(Utc::now().timestamp_millis())
    }

    fn message_rate_at(&self, now: i64) -> f64 {
        let mut timestamps = self
            .message_timestamps
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        prune(&mut timestamps, now, self.window_ms);
        timestamps.len() as f64 / (self.window_ms as f64 / 1000.0)
    }

    pub fn increment_connections(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_connections(&self) {
        self.connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn connection_count(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }

    pub fn total_messages(&self) -> u64 {
        self.total_messages.load(Ordering::Relaxed)
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_messages: self.total_messages(),
            message_rate: self.message_rate(),
            connections: self.connection_count(),
        }
    }
}

fn prune(timestamps: &mut VecDeque<i64>, now: i64, window_ms: i64) {
    while let Some(&oldest) = timestamps.front() {
        if now - oldest > window_ms {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}

impl Default for RelayMetrics {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_messages: u64,
    pub message_rate: f64,
    pub connections: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_message_recording() {
        let metrics = RelayMetrics::new(5);
        assert_eq!(metrics.total_messages(), 0);

        metrics.record_message();
        metrics.record_message();
        assert_eq!(metrics.total_messages(), 2);
    }

    #[test]
    fn test_rate_over_window() {
        let metrics = RelayMetrics::new(5);
        for i in 0..10 {
            metrics.record_message_at(1_000 + i);
        }
        // 10 messages / 5s window
        assert_eq!(metrics.message_rate_at(1_100), 2.0);
    }

    #[test]
    fn test_sliding_window_prunes_old_messages() {
        let metrics = RelayMetrics::new(5);
        metrics.record_message_at(0);
        metrics.record_message_at(6_000);

        assert_eq!(metrics.message_rate_at(6_000), 0.2);
        // Lifetime counter keeps everything
        assert_eq!(metrics.total_messages(), 2);
    }

    #[test]
    fn test_connection_tracking() {
        let metrics = RelayMetrics::default();
        metrics.increment_connections();
        metrics.increment_connections();
        metrics.decrement_connections();
        assert_eq!(metrics.connection_count(), 1);
    }

    #[test]
    fn test_concurrent_recording() {
        let metrics = Arc::new(RelayMetrics::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.record_message();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.total_messages(), 800);
    }
}
