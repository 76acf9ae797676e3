use core::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH as SYSTEM_UNIX_EPOCH};

/// The Unix epoch. Ids generated against it carry plain Unix milliseconds in
/// their timestamp field, which keeps them compatible with deployments that
/// never configured a custom epoch.
pub const UNIX_EPOCH: Duration = Duration::ZERO;

/// Twitter's epoch (2010-11-04T01:42:54.657Z).
pub const TWITTER_EPOCH: Duration = Duration::from_millis(1_288_834_974_657);

/// A source of millisecond timestamps relative to some epoch.
///
/// The generator compares successive readings, so implementations may go
/// backwards (wall clocks do); the generator waits those regressions out.
pub trait TimeSource {
    /// Returns the number of milliseconds elapsed since the source's epoch.
    fn current_millis(&self) -> u64;
}

/// Wall-clock time source backed by [`SystemTime`].
///
/// Every reading samples the system clock, so NTP steps and manual clock
/// changes are visible to the generator.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    epoch_ms: u64,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::with_epoch(UNIX_EPOCH)
    }
}

impl SystemClock {
    /// Creates a clock whose readings are measured from `epoch` (a duration
    /// since the Unix epoch).
    pub fn with_epoch(epoch: Duration) -> Self {
        Self {
            epoch_ms: u64::try_from(epoch.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub const fn epoch_millis(&self) -> u64 {
        self.epoch_ms
    }
}

impl TimeSource for SystemClock {
    fn current_millis(&self) -> u64 {
        // A clock set before the Unix epoch reads as zero and the generator
        // waits until it catches up with the last issued timestamp.
        let unix_ms = SystemTime::now()
            .duration_since(SYSTEM_UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        unix_ms.saturating_sub(self.epoch_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_epoch_shifts_readings() {
        let unix = SystemClock::default();
        let twitter = SystemClock::with_epoch(TWITTER_EPOCH);

        let a = unix.current_millis();
        let b = twitter.current_millis();
        let c = unix.current_millis();

        assert!(a <= b + TWITTER_EPOCH.as_millis() as u64);
        assert!(b + TWITTER_EPOCH.as_millis() as u64 <= c);
    }

    #[test]
    fn epoch_in_the_future_saturates_to_zero() {
        let clock = SystemClock::with_epoch(Duration::from_millis(u64::MAX / 2));
        assert_eq!(clock.current_millis(), 0);
    }
}
