use std::time::{Duration, Instant};

/// Delay before the first status poll after the queue is started.
pub const START_POLL_DELAY: Duration = Duration::from_millis(100);

/// A single re-armable timer. At most one tick is pending at a time.
#[derive(Debug, Clone, Default)]
pub struct StatusPoller {
    deadline: Option<Instant>,
}

impl StatusPoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any pending tick with one `delay` after `now`.
    pub fn schedule(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consumes the pending tick if it is due. A consumed tick must be re-armed by the
    /// caller if more polling is needed.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Whether an asset that has seen no progress since `last_progress` has stalled.
pub fn has_stalled(last_progress: Instant, now: Instant, timeout: Option<Duration>) -> bool {
    match timeout {
        Some(timeout) => now.saturating_duration_since(last_progress) >= timeout,
        None => false,
    }
}
