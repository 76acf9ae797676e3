//! Bounded pool of store handles.
//!
//! The pool doubles as an admission valve: at most `capacity` store calls are
//! in flight at once, and further callers wait in [`StorePool::acquire`] until
//! a handle comes back.

use core::ops::Deref;

use parking_lot::Mutex;
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::{Error, Result};

pub struct StorePool<S> {
    handles: Mutex<Vec<S>>,
    permits: Semaphore,
    capacity: usize,
}

impl<S> StorePool<S> {
    /// Builds a pool from pre-created handles. The pool size is the number of
    /// handles.
    pub fn new(handles: Vec<S>) -> Self {
        let capacity = handles.len();
        Self {
            handles: Mutex::new(handles),
            permits: Semaphore::new(capacity),
            capacity,
        }
    }

    /// Builds a pool of `size` clones of `handle`.
    pub fn replicate(handle: S, size: usize) -> Self
    where
        S: Clone,
    {
        Self::new(vec![handle; size])
    }

    /// Checks a handle out, waiting while the pool is exhausted.
    ///
    /// The handle returns to the pool when the guard is dropped, on every
    /// exit path of the caller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] once the pool has been closed.
    pub async fn acquire(&self) -> Result<PooledHandle<'_, S>> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Error::unavailable("store pool is closed"))?;

        // A permit guarantees a parked handle.
        let handle = self
            .handles
            .lock()
            .pop()
            .ok_or_else(|| Error::unavailable("store pool has no idle handle"))?;

        Ok(PooledHandle {
            pool: self,
            handle: Some(handle),
            _permit: permit,
        })
    }

    /// Stops handing out handles. Waiters and future callers get
    /// [`Error::StoreUnavailable`]; checked-out handles are still returned.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of handles not currently checked out.
    pub fn idle(&self) -> usize {
        self.handles.lock().len()
    }
}

impl<S> core::fmt::Debug for StorePool<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StorePool")
            .field("capacity", &self.capacity)
            .field("idle", &self.idle())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A handle checked out of a [`StorePool`].
pub struct PooledHandle<'a, S> {
    pool: &'a StorePool<S>,
    handle: Option<S>,
    // Dropped after `Drop::drop` has parked the handle, so a waiter woken by
    // the permit always finds it.
    _permit: SemaphorePermit<'a>,
}

impl<S> Deref for PooledHandle<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        // Only `Drop` takes the handle out.
        self.handle.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl<S> Drop for PooledHandle<'_, S> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.handles.lock().push(handle);
        }
    }
}
