/// A result type defaulting to the crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All error variants that `seqflake` can emit.
///
/// CAS version mismatches never show up here: they are retried inside the
/// bounded retry loop and only surface as [`Error::StoreUnavailable`] once the
/// attempt budget is spent.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The key does not exist in the store. Counters must be provisioned by
    /// an operator before the first allocation.
    #[error("key `{key}` does not exist, it must be created first")]
    NotFound { key: String },

    /// The stored value is not a base-10 `i64`, or advancing it would
    /// overflow.
    #[error("malformed value at `{key}`: {reason}")]
    Malformed { key: String, reason: String },

    /// The store could not be reached, the pool was closed, or the retry
    /// budget was exhausted.
    #[error("store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    /// The shared machine id counter no longer fits in the machine id field.
    #[error("machine id counter reached {counter}, which exceeds the {max} machine id limit")]
    MachineIdExhausted { counter: i64, max: u16 },
}

impl Error {
    pub(crate) fn unavailable(reason: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            reason: reason.into(),
        }
    }

    /// Returns `true` when retrying the same operation may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}
