//! Fixed-window upload rate limiter

use std::time::Duration;

use tokio::time::Instant;

/// Answer of [`RateLimiter::try_acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimiterState {
    /// Below the limit; the attempt was counted.
    Incrementing,
    /// Limit reached for the current window.
    Throttled { remaining: Duration },
}

/// Allows at most `max_count` uploads per `interval`.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    max_count: u32,
    count: u32,
    started: Option<Instant>,
}

impl RateLimiter {
    pub fn new(interval: Duration, max_count: u32) -> Self {
        Self { interval, max_count, count: 0, started: None }
    }

    /// Count one upload, unless the current window is exhausted.
    pub fn try_acquire(&mut self) -> RateLimiterState {
        let now = Instant::now();
        let started = match self.started {
            Some(started) if now.duration_since(started) <= self.interval => started,
            _ => {
                self.count = 0;
                self.started = Some(now);
                now
            }
        };

        if self.count >= self.max_count {
            let remaining = self.interval.saturating_sub(now.duration_since(started));
            return RateLimiterState::Throttled { remaining };
        }

        self.count += 1;
        RateLimiterState::Incrementing
    }
}
