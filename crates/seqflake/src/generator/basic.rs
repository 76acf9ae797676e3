use core::cmp::Ordering;

use crate::{IdGenStatus, SnowflakeGenerator, SnowflakeId, TimeSource};

/// A single-owner Snowflake ID generator.
///
/// The last issued id doubles as the generator state: its timestamp field is
/// `last_timestamp_ms` and its sequence field is the in-millisecond counter.
///
/// ## Features
/// - ✅ Strictly increasing ids for a fixed machine id
/// - ✅ Waits out clock regressions instead of emitting out-of-order ids
/// - ✅ At most 4096 ids per millisecond, then backpressure
/// - ❌ Not `Sync`; wrap it in a single worker or a lock to share it
///
/// ## Recommended When
/// - One task owns generation and serves requests from a queue
/// - Tests need a deterministic [`TimeSource`]
pub struct BasicSnowflakeGenerator<T>
where
    T: TimeSource,
{
    state: SnowflakeId,
    time: T,
}

impl<T> BasicSnowflakeGenerator<T>
where
    T: TimeSource,
{
    /// Creates a new generator with timestamp and sequence zero.
    ///
    /// # Parameters
    ///
    /// - `machine_id`: encoded into bits [21:12] of every id; masked to 10
    ///   bits.
    /// - `time`: the [`TimeSource`] sampled on every poll.
    ///
    /// # Example
    /// ```
    /// use seqflake::{BasicSnowflakeGenerator, SnowflakeGenerator, SystemClock};
    ///
    /// let mut generator = BasicSnowflakeGenerator::new(7, SystemClock::default());
    /// let id = generator.next_id(|_| std::thread::yield_now());
    /// assert_eq!(id.machine_id(), 7);
    /// ```
    pub fn new(machine_id: u64, time: T) -> Self {
        Self::from_components(0, machine_id, 0, time)
    }

    /// Creates a generator preloaded with explicit state. Mostly useful in
    /// tests that need a full sequence or a specific last timestamp.
    pub fn from_components(timestamp: u64, machine_id: u64, sequence: u64, time: T) -> Self {
        Self {
            state: SnowflakeId::from_components(timestamp, machine_id, sequence),
            time,
        }
    }

    /// Attempts to produce the next id.
    ///
    /// # Returns
    /// - `IdGenStatus::Ready { id }` when an id was issued
    /// - `IdGenStatus::Pending { yield_for }` when the sequence for the current
    ///   millisecond is used up (`yield_for == 1`) or the clock is behind the
    ///   last issued timestamp (`yield_for` is the gap)
    pub fn poll_id(&mut self) -> IdGenStatus {
        let now = self.time.current_millis() & SnowflakeId::max_timestamp();
        let current_ts = self.state.timestamp();

        match now.cmp(&current_ts) {
            Ordering::Equal => {
                if self.state.has_sequence_room() {
                    self.state = self.state.increment_sequence();
                    IdGenStatus::Ready { id: self.state }
                } else {
                    IdGenStatus::Pending { yield_for: 1 }
                }
            }
            Ordering::Greater => {
                self.state = self.state.rollover_to_timestamp(now);
                IdGenStatus::Ready { id: self.state }
            }
            Ordering::Less => Self::cold_clock_behind(now, current_ts),
        }
    }

    #[cold]
    #[inline(never)]
    fn cold_clock_behind(now: u64, current_ts: u64) -> IdGenStatus {
        let yield_for = current_ts - now;
        tracing::warn!(
            now,
            last_timestamp = current_ts,
            "clock moved backwards, waiting {yield_for}ms for it to catch up"
        );
        IdGenStatus::Pending { yield_for }
    }

    /// The last issued id (or the initial state if nothing was issued yet).
    pub const fn last_id(&self) -> SnowflakeId {
        self.state
    }
}

impl<T> SnowflakeGenerator for BasicSnowflakeGenerator<T>
where
    T: TimeSource,
{
    fn poll_id(&mut self) -> IdGenStatus {
        self.poll_id()
    }

    fn machine_id(&self) -> u64 {
        self.state.machine_id()
    }
}
