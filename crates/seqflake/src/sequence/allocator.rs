use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

use crate::{KvStore, PendingBlock, Result, RetryPolicy, StorePool, cas_increment};

/// Settings for a [`SequenceAllocator`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceConfig {
    /// Key prefix; the counter for `name` lives at `<prefix>/<name>`.
    pub prefix: String,
    /// Values reserved per CAS round. `1` disables block caching.
    pub step: i64,
    pub policy: RetryPolicy,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            prefix: String::from("/seqs"),
            step: 1,
            policy: RetryPolicy::default(),
        }
    }
}

/// Serves durable auto-increment counters kept in a [`KvStore`].
///
/// Each name has its own async mutex covering both the CAS loop and the
/// name's [`PendingBlock`], so same-name callers queue up while different
/// names proceed in parallel. Two callers can never both find an empty block
/// and reserve overlapping ranges.
pub struct SequenceAllocator<S> {
    pool: Arc<StorePool<S>>,
    prefix: String,
    step: i64,
    policy: RetryPolicy,
    blocks: Mutex<HashMap<String, Arc<AsyncMutex<PendingBlock>>>>,
}

impl<S> SequenceAllocator<S>
where
    S: KvStore,
{
    /// Creates an allocator drawing store handles from `pool`. A `step` below
    /// one is treated as one.
    pub fn new(pool: Arc<StorePool<S>>, config: SequenceConfig) -> Self {
        let prefix = config.prefix.trim_end_matches('/').to_owned();
        Self {
            pool,
            prefix,
            step: config.step.max(1),
            policy: config.policy,
            blocks: Mutex::new(HashMap::new()),
        }
    }

    /// Store key of the counter called `name`.
    pub fn key_for(&self, name: &str) -> String {
        format!("{}/{}", self.prefix, name)
    }

    pub const fn step(&self) -> i64 {
        self.step
    }

    /// Returns the next value of the counter called `name`.
    ///
    /// With `step == 1` every call performs one CAS round. With a larger step
    /// a call either pops the name's cached block or, when it is empty,
    /// reserves `step` values in one round and returns the first.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`](crate::Error::NotFound) if the counter does not
    ///   exist
    /// - [`Error::Malformed`](crate::Error::Malformed) if its value is not an
    ///   integer
    /// - [`Error::StoreUnavailable`](crate::Error::StoreUnavailable) if the
    ///   store cannot be reached or the retry budget runs out
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn allocate(&self, name: &str) -> Result<i64> {
        let slot = self.block_for(name);
        let mut block = slot.lock().await;

        if let Some(value) = block.pop() {
            return Ok(value);
        }

        let key = self.key_for(name);
        let reserved = match self.pool.acquire().await {
            Ok(store) => cas_increment(&*store, &key, self.step, &self.policy).await,
            Err(e) => Err(e),
        };
        let inc = match reserved {
            Ok(inc) => inc,
            Err(e) => {
                drop(block);
                self.forget_if_idle(name, slot);
                return Err(e);
            }
        };

        if self.step > 1 {
            tracing::debug!(
                key,
                from = inc.previous + 1,
                to = inc.current,
                attempts = inc.attempts,
                "reserved block"
            );
        }

        block.refill(inc.previous, inc.current);
        Ok(block.pop().unwrap_or(inc.current))
    }

    /// Number of values cached locally for `name`.
    pub async fn cached(&self, name: &str) -> u64 {
        let block = self.blocks.lock().get(name).cloned();
        match block {
            Some(block) => block.lock().await.remaining(),
            None => 0,
        }
    }

    /// Number of names with a lock slot.
    pub fn tracked_names(&self) -> usize {
        self.blocks.lock().len()
    }

    // Drops the slot of a name whose reservation failed, unless another
    // caller holds it. Its block is empty, so nothing is lost. Our handle is
    // released under the map lock so the last failing caller sees a count of
    // two.
    fn forget_if_idle(&self, name: &str, slot: Arc<AsyncMutex<PendingBlock>>) {
        let mut blocks = self.blocks.lock();
        let idle = blocks.get(name).is_some_and(|current| {
            Arc::ptr_eq(current, &slot) && Arc::strong_count(&slot) == 2
        });
        if idle {
            blocks.remove(name);
        }
        drop(slot);
    }

    fn block_for(&self, name: &str) -> Arc<AsyncMutex<PendingBlock>> {
        let mut blocks = self.blocks.lock();
        if let Some(block) = blocks.get(name) {
            return Arc::clone(block);
        }
        let block = Arc::new(AsyncMutex::new(PendingBlock::empty()));
        blocks.insert(name.to_owned(), Arc::clone(&block));
        block
    }
}

impl<S> core::fmt::Debug for SequenceAllocator<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SequenceAllocator")
            .field("prefix", &self.prefix)
            .field("step", &self.step)
            .field("policy", &self.policy)
            .field("names", &self.blocks.lock().len())
            .finish_non_exhaustive()
    }
}
