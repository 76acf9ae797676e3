use core::future::Future;

use crate::Result;

/// A value read from the store together with the version it was read at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Versioned {
    pub value: String,
    /// Opaque, store-assigned version. A CAS conditioned on it succeeds only
    /// if nobody wrote the key since the read.
    pub version: i64,
}

/// Outcome of a conditional write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Swap {
    /// The write was applied.
    Swapped,
    /// The key changed (or disappeared) since the expected version was read.
    Conflict,
}

/// The versioned Get/CAS-Set primitive the service is built on.
///
/// Implementations must give linearizable reads and atomic conditional
/// writes; everything else (retries, parsing, key layout) lives above this
/// trait. Transport failures are reported as
/// [`Error::StoreUnavailable`](crate::Error::StoreUnavailable).
pub trait KvStore: Send + Sync + 'static {
    /// Reads `key`, returning `None` if it does not exist.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Versioned>>> + Send;

    /// Writes `value` to `key` only if its current version is `expected`.
    fn compare_and_swap(
        &self,
        key: &str,
        value: &str,
        expected: i64,
    ) -> impl Future<Output = Result<Swap>> + Send;
}
