// Throttled single-flight gate for auxiliary lookups (idle -> in flight -> idle).

use tokio::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct SideChannel {
    min_interval: Duration,
    in_flight: bool,
    last_started: Option<Instant>,
}

impl SideChannel {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            in_flight: false,
            last_started: None,
        }
    }

    /// Claims the channel if it is idle and the last launch is at least
    /// `min_interval` old. Returns false (launch nothing) otherwise.
    pub fn try_begin(&mut self, now: Instant) -> bool {
        if self.in_flight {
            return false;
        }
        if let Some(last) = self.last_started
            && now.saturating_duration_since(last) < self.min_interval
        {
            return false;
        }
        self.in_flight = true;
        self.last_started = Some(now);
        true
    }

    pub fn finish(&mut self) {
        self.in_flight = false;
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Forgets the throttle window so the next `try_begin` may launch at once.
    pub fn reset_throttle(&mut self) {
        self.last_started = None;
    }
}
