use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Per-event elapsed-time gate.
///
/// Only the executor resets it, and the executor is the single consumer of
/// the dispatch queue, so `is_ready` followed by `reset` never interleaves
/// with another request for the same event. The mutex exists to make the
/// type `Sync` for sharing through the catalog, not for coordination.
#[derive(Debug)]
pub struct Cooldown {
    threshold: Option<Duration>,
    started: Mutex<Option<Instant>>,
}

impl Cooldown {
    pub fn new(threshold: Option<Duration>) -> Self {
        Self {
            threshold,
            started: Mutex::new(None),
        }
    }

    pub fn none() -> Self {
        Self::new(None)
    }

    pub fn threshold(&self) -> Option<Duration> {
        self.threshold
    }

    /// True if no cooldown is configured, the clock never started, or the
    /// configured threshold has been exceeded.
    pub fn is_ready(&self) -> bool {
        let Some(threshold) = self.threshold else {
            return true;
        };
        match *self.started.lock().unwrap_or_else(PoisonError::into_inner) {
            None => true,
            Some(started) => started.elapsed() > threshold,
        }
    }

    /// Restart the elapsed-time clock.
    pub fn reset(&self) {
        *self.started.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    /// Time left before the gate opens again, if it is closed.
    pub fn remaining(&self) -> Option<Duration> {
        let threshold = self.threshold?;
        let started = (*self.started.lock().unwrap_or_else(PoisonError::into_inner))?;
        let elapsed = started.elapsed();
        (elapsed <= threshold).then(|| threshold - elapsed)
    }
}
