use std::time::{Duration, Instant};

/// Admits at most one frame per interval; everything in between is dropped
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last_admitted: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_admitted: None,
        }
    }

    /// Record the frame as admitted if a full interval has passed
    pub fn admit(&mut self, now: Instant) -> bool {
        match self.last_admitted {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last_admitted = Some(now);
                true
            }
        }
    }

    /// Time left until the next frame would be admitted
    pub fn wait_time(&self, now: Instant) -> Duration {
        match self.last_admitted {
            Some(last) => self
                .interval
                .saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
