//! Jittered exponential backoff for the claim loop.

use rand::Rng;
use std::time::Duration;

/// Exponential backoff with jitter.
///
/// Attempt `n` draws uniformly from `[min(b, max), min(2b, max)]` where
/// `b = initial * 2^n`. Delays never shrink between calls and never exceed `max`
/// until [`Backoff::reset`] is called.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    attempt: u32,
    last: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            attempt: 0,
            last: Duration::ZERO,
        }
    }

    pub fn next(&mut self) -> Duration {
        let max_ms = millis(self.max);
        let base = millis(self.initial)
            .saturating_mul(1u64.checked_shl(self.attempt).unwrap_or(u64::MAX));

        let low = base.min(max_ms);
        let high = base.saturating_mul(2).min(max_ms);
        let jittered = if high > low {
            rand::thread_rng().gen_range(low..=high)
        } else {
            low
        };

        let delay = Duration::from_millis(jittered).max(self.last).min(self.max);
        self.last = delay;
        if base < max_ms {
            self.attempt += 1;
        }
        delay
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
        self.last = Duration::ZERO;
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
