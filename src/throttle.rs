//! Coalescing of high-frequency gesture updates.

use std::time::{Duration, Instant};

/// Rate limiter for one gesture.
///
/// The first value after a quiet period passes straight through. Later values
/// inside the interval replace a single pending slot, which is emitted once
/// the interval has elapsed or when the gesture ends, whichever comes first.
#[derive(Clone, Debug)]
pub struct Coalescer<T> {
    interval: Duration,
    last_emit: Option<Instant>,
    pending: Option<T>,
}

impl<T> Coalescer<T> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
            pending: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Offer a new value. Returns it when it may be emitted right away,
    /// otherwise it becomes the pending value.
    pub fn offer(&mut self, value: T, now: Instant) -> Option<T> {
        if self.is_due(now) {
            self.pending = None;
            self.last_emit = Some(now);
            Some(value)
        } else {
            self.pending = Some(value);
            None
        }
    }

    /// The pending value, once its interval has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        if self.pending.is_some() && self.is_due(now) {
            self.last_emit = Some(now);
            self.pending.take()
        } else {
            None
        }
    }

    /// End of gesture: hand out whatever is still pending and reset.
    pub fn flush(&mut self) -> Option<T> {
        self.last_emit = None;
        self.pending.take()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn is_due(&self, now: Instant) -> bool {
        match self.last_emit {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }
}
