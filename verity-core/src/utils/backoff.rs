use rand::Rng;
use std::time::Duration;

/// Poll cadence of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    /// Delay between ticks while the stream is healthy.
    pub interval: Duration,
    /// Upper bound of the delay after consecutive failures.
    pub max_backoff: Duration,
}

impl PollSchedule {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);
    pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(300);

    /// Returns the delay before the next tick.
    ///
    /// Each consecutive failure doubles the interval, capped at
    /// `max_backoff` (or `interval` if that is larger).
    pub fn next_delay(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            return self.interval;
        }
        let factor = 1u32 << consecutive_failures.min(16);
        self.interval
            .saturating_mul(factor)
            .min(self.max_backoff.max(self.interval))
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            max_backoff: Self::DEFAULT_MAX_BACKOFF,
        }
    }
}

/// Adds up to 10% random jitter so backed-off streams do not retry in lockstep.
pub fn with_jitter(delay: Duration) -> Duration {
    let spread = delay.as_millis() as u64 / 10;
    if spread == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::rng().random_range(0..=spread))
}
