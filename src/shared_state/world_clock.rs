use crate::protocol::StateChange;

/// Day-night cycle anchor: `phase` was valid at `server_time`.
/// Every instance derives the current phase from its own clock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldClock {
    pub phase: f64,
    pub server_time: i64,
    pub day_length_ms: i64,
}

impl WorldClock {
    pub fn new(phase: f64, server_time: i64, day_length_ms: i64) -> Self {
        Self {
            phase: wrap_phase(phase),
            server_time,
            day_length_ms,
        }
    }

    /// Phase in [0, 1) at `now`
    pub fn current_phase(&self, now: i64) -> f64 {
        if self.day_length_ms <= 0 {
            return self.phase;
        }
        let elapsed = (now - self.server_time) as f64 / self.day_length_ms as f64;
        wrap_phase(self.phase + elapsed)
    }

    /// Same cycle, re-anchored at `now`
    pub fn rebased(&self, now: i64) -> Self {
        Self {
            phase: self.current_phase(now),
            server_time: now,
            day_length_ms: self.day_length_ms,
        }
    }

    pub fn to_change(&self) -> StateChange {
        StateChange::WorldClock {
            phase: self.phase,
            server_time: self.server_time,
            day_length_ms: self.day_length_ms,
        }
    }
}

fn wrap_phase(phase: f64) -> f64 {
    if !phase.is_finite() {
        return 0.0;
    }
    let wrapped = phase.rem_euclid(1.0);
    // rem_euclid can round up to exactly 1.0 for tiny negative inputs
    if wrapped >= 1.0 {
        0.0
    } else {
        wrapped
    }
}
