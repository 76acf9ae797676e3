use core::{future::Future, time::Duration};

use crate::{IdGenStatus, SnowflakeGenerator, SnowflakeId};

/// Abstracts over how to sleep for a given [`Duration`] in async contexts.
///
/// Taking `&self` lets tests hand in a sleeper that advances a mock clock
/// instead of waiting on a real timer.
pub trait SleepProvider {
    /// `Send` so that the future can be moved across threads.
    type Sleep: Future<Output = ()> + Send;

    fn sleep_for(&self, dur: Duration) -> Self::Sleep;
}

/// A [`SleepProvider`] backed by Tokio's timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleep;

impl SleepProvider for TokioSleep {
    type Sleep = tokio::time::Sleep;

    fn sleep_for(&self, dur: Duration) -> Self::Sleep {
        tokio::time::sleep(dur)
    }
}

/// Extension trait for generating Snowflake IDs from async code.
///
/// When the generator is pending, the returned future sleeps for the
/// advertised number of milliseconds and polls again, so it only resolves
/// once an id has been issued.
pub trait SnowflakeGeneratorAsyncExt {
    fn next_id_async<'a, S>(&'a mut self, sleeper: &'a S) -> impl Future<Output = SnowflakeId> + Send + 'a
    where
        S: SleepProvider + Sync;
}

impl<G> SnowflakeGeneratorAsyncExt for G
where
    G: SnowflakeGenerator + Send,
{
    fn next_id_async<'a, S>(&'a mut self, sleeper: &'a S) -> impl Future<Output = SnowflakeId> + Send + 'a
    where
        S: SleepProvider + Sync,
    {
        async move {
            loop {
                let dur = match self.poll_id() {
                    IdGenStatus::Ready { id } => return id,
                    IdGenStatus::Pending { yield_for } => Duration::from_millis(yield_for),
                };
                sleeper.sleep_for(dur).await;
            }
        }
    }
}
