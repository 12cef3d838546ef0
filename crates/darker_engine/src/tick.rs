//! Fixed-interval, drift-correcting tick scheduler.
//!
//! The scheduler only does the timing arithmetic; the engine decides what a
//! due tick does (drain one queued action) and the runtime does the sleeping.
//!
//! On every iteration:
//!
//! 1. `elapsed = now - last_tick`.
//! 2. If `elapsed >= interval`, a drain is due and `last_tick` advances by
//!    `elapsed - (elapsed mod interval)`, which keeps ticks on the original
//!    grid no matter how late this iteration ran.
//! 3. The next wake-up is `max(0, interval - (now - last_tick))`.

use std::time::Duration;

use tokio::time::Instant;

/// Timing state of the tick loop.
#[derive(Debug, Clone)]
pub struct TickScheduler {
    interval: Duration,
    last_tick: Instant,
}

impl TickScheduler {
    /// Start a scheduler whose grid begins at `now`.
    #[must_use]
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            last_tick: now,
        }
    }

    /// The configured interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The reference time of the last processed tick.
    #[must_use]
    pub fn last_tick(&self) -> Instant {
        self.last_tick
    }

    /// Returns `true` if a drain is due at `now`, advancing the reference
    /// tick if so.
    pub fn poll(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_tick);
        if elapsed < self.interval {
            return false;
        }
        self.last_tick += elapsed - remainder(elapsed, self.interval);
        true
    }

    /// Start a fresh grid at `now`, forgetting any missed ticks.
    pub fn restart(&mut self, now: Instant) {
        self.last_tick = now;
    }

    /// How long to wait, from `now`, until the next tick is due.
    #[must_use]
    pub fn next_delay(&self, now: Instant) -> Duration {
        self.interval
            .saturating_sub(now.saturating_duration_since(self.last_tick))
    }
}

fn remainder(elapsed: Duration, interval: Duration) -> Duration {
    let interval = interval.as_nanos();
    if interval == 0 {
        return Duration::ZERO;
    }
    let rem = elapsed.as_nanos() % interval;
    Duration::from_nanos(u64::try_from(rem).unwrap_or(u64::MAX))
}
