#![forbid(unsafe_code)]

//! Monotonic time source seam.

use core::time::Duration;

/// Monotonic clock read by hosts before calling into the router.
pub trait RouterClock {
    /// Time since an arbitrary fixed origin.
    fn now_mono(&self) -> Duration;
}

/// Deterministic monotonic clock controlled by the caller.
#[derive(Debug, Default, Clone)]
pub struct DeterministicClock {
    now: Duration,
}

impl DeterministicClock {
    /// Create a clock starting at `0`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: Duration::ZERO,
        }
    }

    /// Set current monotonic time. Never moves backwards.
    pub fn set(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }

    /// Advance monotonic time by `dt`.
    pub fn advance(&mut self, dt: Duration) {
        self.now = self.now.saturating_add(dt);
    }
}

impl RouterClock for DeterministicClock {
    fn now_mono(&self) -> Duration {
        self.now
    }
}
