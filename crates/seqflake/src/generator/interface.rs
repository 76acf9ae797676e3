use crate::{IdGenStatus, SnowflakeId};

/// A minimal interface for generating Snowflake IDs.
///
/// Generators take `&mut self`: the timestamp/sequence state has exactly one
/// owner, and concurrent callers are serialized by whoever owns the generator
/// (the server gives it to a single worker task).
pub trait SnowflakeGenerator {
    /// Polls for the next id without waiting.
    fn poll_id(&mut self) -> IdGenStatus;

    /// The machine id encoded in every id this generator produces.
    fn machine_id(&self) -> u64;

    /// Returns the next id, calling `f` with the number of milliseconds to
    /// wait whenever the generator is pending.
    fn next_id(&mut self, mut f: impl FnMut(u64)) -> SnowflakeId
    where
        Self: Sized,
    {
        loop {
            match self.poll_id() {
                IdGenStatus::Ready { id } => break id,
                IdGenStatus::Pending { yield_for } => f(yield_for),
            }
        }
    }
}
