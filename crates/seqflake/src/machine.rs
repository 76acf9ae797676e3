//! Machine identity assignment.
//!
//! Every running instance needs a distinct 10-bit machine id so that the ids
//! it generates cannot collide with another instance's. The id either comes
//! from configuration or from atomically incrementing a shared counter in the
//! store.

use core::fmt;

use crate::{Error, KvStore, Result, RetryPolicy, SnowflakeId, StorePool, cas_increment};

/// A 10-bit machine identity, fixed for the lifetime of the process.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MachineId(u16);

impl MachineId {
    pub const MAX: u16 = SnowflakeId::MACHINE_ID_MASK as u16;

    /// Keeps the low 10 bits of `raw`.
    pub const fn masked(raw: u64) -> Self {
        Self((raw & SnowflakeId::MACHINE_ID_MASK) as u16)
    }

    pub const fn get(self) -> u16 {
        self.0
    }
}

impl From<MachineId> for u64 {
    fn from(id: MachineId) -> Self {
        u64::from(id.0)
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the machine id comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MachineIdSource {
    /// Use this value (masked to 10 bits) and never touch the store.
    Override(u64),
    /// Increment the shared counter stored at this key.
    Store { key: String },
}

/// Obtains this instance's [`MachineId`] once at startup.
#[derive(Clone, Debug)]
pub struct MachineIdAssigner {
    source: MachineIdSource,
    policy: RetryPolicy,
    allow_wraparound: bool,
}

impl MachineIdAssigner {
    pub const fn new(source: MachineIdSource, policy: RetryPolicy) -> Self {
        Self {
            source,
            policy,
            allow_wraparound: false,
        }
    }

    /// Accept shared counter values above [`MachineId::MAX`] by masking them.
    ///
    /// Masking means the 1025th instance gets the same machine id as the
    /// first; only enable this if old instances are known to be gone.
    pub const fn allow_wraparound(mut self, allow: bool) -> Self {
        self.allow_wraparound = allow;
        self
    }

    /// Assigns the machine id.
    ///
    /// # Errors
    ///
    /// Any error is meant to abort startup:
    /// - [`Error::NotFound`] if the shared counter key does not exist
    /// - [`Error::Malformed`] if it does not hold an integer
    /// - [`Error::StoreUnavailable`] if the store is unreachable or every CAS
    ///   attempt lost its race
    /// - [`Error::MachineIdExhausted`] if the counter passed
    ///   [`MachineId::MAX`] and wraparound is not allowed
    pub async fn assign<S: KvStore>(&self, pool: &StorePool<S>) -> Result<MachineId> {
        match &self.source {
            MachineIdSource::Override(raw) => {
                let id = MachineId::masked(*raw);
                if u64::from(id) != *raw {
                    tracing::warn!(
                        requested = raw,
                        assigned = id.get(),
                        "machine id override does not fit in 10 bits, masking it"
                    );
                }
                tracing::info!(machine_id = id.get(), "using configured machine id");
                Ok(id)
            }
            MachineIdSource::Store { key } => {
                let store = pool.acquire().await?;
                let inc = cas_increment(&*store, key, 1, &self.policy).await?;
                drop(store);
                self.from_counter(key, inc.current)
            }
        }
    }

    fn from_counter(&self, key: &str, counter: i64) -> Result<MachineId> {
        let in_range = (0..=i64::from(MachineId::MAX)).contains(&counter);
        if !in_range {
            if !self.allow_wraparound {
                return Err(Error::MachineIdExhausted {
                    counter,
                    max: MachineId::MAX,
                });
            }
            tracing::warn!(
                key,
                counter,
                "machine id counter exceeds {}; the masked id may collide with a live instance",
                MachineId::MAX
            );
        }

        // Two's complement masking keeps the low bits for negative counters too.
        let id = MachineId::masked(counter as u64);
        tracing::info!(key, counter, machine_id = id.get(), "machine id assigned from store");
        Ok(id)
    }
}
