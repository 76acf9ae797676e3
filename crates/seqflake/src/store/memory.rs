use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;

use crate::{KvStore, Result, Swap, Versioned};

#[derive(Debug, Default)]
struct Inner {
    revision: i64,
    entries: HashMap<String, Versioned>,
}

/// An in-process [`KvStore`].
///
/// Versions come from a single store-wide revision counter, the same model
/// etcd uses for `mod_revision`. Clones share the same map, so a clone per
/// pool slot behaves like many connections to one server.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditionally writes `value` to `key`, like an operator creating a
    /// counter out-of-band.
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut inner = self.inner.lock();
        inner.revision += 1;
        let version = inner.revision;
        inner.entries.insert(
            key.into(),
            Versioned {
                value: value.into(),
                version,
            },
        );
    }

    /// Writes `value` to `key` unless the key already exists. Returns `true`
    /// if the key was created.
    pub fn put_if_absent(&self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(&key) {
            return false;
        }
        inner.revision += 1;
        let version = inner.revision;
        inner.entries.insert(
            key,
            Versioned {
                value: value.into(),
                version,
            },
        );
        true
    }

    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.lock();
        inner.revision += 1;
        inner.entries.remove(key).is_some()
    }

    /// Current value at `key`, if any.
    pub fn value(&self, key: &str) -> Option<String> {
        self.inner.lock().entries.get(key).map(|v| v.value.clone())
    }
}

impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Versioned>> {
        Ok(self.inner.lock().entries.get(key).cloned())
    }

    async fn compare_and_swap(&self, key: &str, value: &str, expected: i64) -> Result<Swap> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let revision = inner.revision + 1;
        match inner.entries.get_mut(key) {
            Some(entry) if entry.version == expected => {
                entry.value = value.to_owned();
                entry.version = revision;
                inner.revision = revision;
                Ok(Swap::Swapped)
            }
            _ => Ok(Swap::Conflict),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cas_succeeds_only_on_matching_version() {
        let store = MemoryStore::new();
        store.put("/seqs/a", "1");

        let read = store.get("/seqs/a").await.unwrap().unwrap();
        assert_eq!(read.value, "1");

        assert_eq!(
            store.compare_and_swap("/seqs/a", "2", read.version).await.unwrap(),
            Swap::Swapped
        );
        assert_eq!(
            store.compare_and_swap("/seqs/a", "3", read.version).await.unwrap(),
            Swap::Conflict
        );
        assert_eq!(store.value("/seqs/a").as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn cas_on_missing_key_conflicts() {
        let store = MemoryStore::new();
        assert_eq!(store.get("/nope").await.unwrap(), None);
        assert_eq!(
            store.compare_and_swap("/nope", "1", 0).await.unwrap(),
            Swap::Conflict
        );
        assert_eq!(store.value("/nope"), None);
    }

    #[tokio::test]
    async fn clones_share_state_and_versions_advance() {
        let a = MemoryStore::new();
        let b = a.clone();
        a.put("/k", "1");
        let v1 = b.get("/k").await.unwrap().unwrap().version;
        b.put("/other", "x");
        a.put("/k", "5");
        let v2 = b.get("/k").await.unwrap().unwrap().version;
        assert!(v2 > v1);
        assert!(!a.put_if_absent("/k", "9"));
        assert_eq!(b.value("/k").as_deref(), Some("5"));
        assert!(a.delete("/k"));
        assert_eq!(b.value("/k"), None);
    }
}
