use core::time::Duration;
use rand::Rng;

/// Bounded retry policy for CAS loops.
///
/// Each failed attempt waits `base_delay` plus a uniformly random jitter in
/// `[0, max_jitter]`, so instances that lost the same race spread out before
/// retrying.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of CAS rounds before giving up. Always at least one.
    pub max_attempts: u32,
    /// Fixed part of the delay between attempts.
    pub base_delay: Duration,
    /// Upper bound of the random part of the delay.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 32,
            base_delay: Duration::ZERO,
            max_jitter: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_delay: Duration, max_jitter: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_jitter,
        }
    }

    /// Effective attempt budget; a zero budget still makes one attempt.
    pub const fn attempts(&self) -> u32 {
        if self.max_attempts == 0 {
            1
        } else {
            self.max_attempts
        }
    }

    /// Picks the delay before the next attempt.
    pub fn delay(&self) -> Duration {
        let jitter_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        };
        self.base_delay.saturating_add(jitter)
    }

    /// Sleeps for [`Self::delay`].
    pub async fn backoff(&self) {
        let delay = self.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
