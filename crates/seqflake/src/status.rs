use crate::SnowflakeId;

/// Represents the result of polling a generator for a new id.
///
/// - [`IdGenStatus::Ready`] indicates a new ID was successfully generated.
/// - [`IdGenStatus::Pending`] means the generator cannot produce an id until
///   the clock moves forward by `yield_for` milliseconds, either because the
///   sequence is exhausted or because the clock moved backwards.
///
/// # Example
///
/// ```
/// use seqflake::{BasicSnowflakeGenerator, IdGenStatus, SnowflakeId, TimeSource};
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_millis(&self) -> u64 {
///         1
///     }
/// }
///
/// let mut generator =
///     BasicSnowflakeGenerator::from_components(0, 1, SnowflakeId::max_sequence(), FixedTime);
/// match generator.poll_id() {
///     IdGenStatus::Ready { id } => println!("ID: {}", id.timestamp()),
///     IdGenStatus::Pending { yield_for } => println!("Back off for {yield_for}ms"),
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdGenStatus {
    /// A unique ID was generated and is ready to use.
    Ready {
        /// The generated Snowflake ID.
        id: SnowflakeId,
    },
    /// No ID could be generated yet.
    Pending {
        /// Milliseconds to wait before polling again.
        yield_for: u64,
    },
}
