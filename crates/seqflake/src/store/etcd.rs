use core::time::Duration;

use etcd_client::{Client, Compare, CompareOp, ConnectOptions, KvClient, Txn, TxnOp};

use crate::{Error, KvStore, Result, Swap, Versioned};

/// A [`KvStore`] backed by etcd v3.
///
/// The version of a key is its `mod_revision`; a CAS is a transaction that
/// compares `mod_revision` and puts on success. The underlying gRPC channel
/// is shared by all clones, so cloning is how the pool gets its handles.
#[derive(Clone)]
pub struct EtcdStore {
    kv: KvClient,
}

impl EtcdStore {
    /// Connects to the given endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if no endpoint can be reached
    /// within `timeout`.
    pub async fn connect<E: AsRef<str>>(endpoints: &[E], timeout: Duration) -> Result<Self> {
        let options = ConnectOptions::new()
            .with_connect_timeout(timeout)
            .with_timeout(timeout);
        let client = Client::connect(endpoints, Some(options))
            .await
            .map_err(|e| Error::unavailable(format!("failed to connect to etcd: {e}")))?;
        Ok(Self {
            kv: client.kv_client(),
        })
    }
}

impl core::fmt::Debug for EtcdStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EtcdStore").finish_non_exhaustive()
    }
}

impl KvStore for EtcdStore {
    async fn get(&self, key: &str) -> Result<Option<Versioned>> {
        let mut kv = self.kv.clone();
        let resp = kv
            .get(key, None)
            .await
            .map_err(|e| Error::unavailable(format!("get `{key}` failed: {e}")))?;

        let Some(entry) = resp.kvs().first() else {
            return Ok(None);
        };
        let value = entry.value_str().map_err(|_| Error::Malformed {
            key: key.to_owned(),
            reason: "value is not valid UTF-8".to_owned(),
        })?;

        Ok(Some(Versioned {
            value: value.to_owned(),
            version: entry.mod_revision(),
        }))
    }

    async fn compare_and_swap(&self, key: &str, value: &str, expected: i64) -> Result<Swap> {
        let mut kv = self.kv.clone();
        let txn = Txn::new()
            .when([Compare::mod_revision(key, CompareOp::Equal, expected)])
            .and_then([TxnOp::put(key, value, None)]);

        let resp = kv
            .txn(txn)
            .await
            .map_err(|e| Error::unavailable(format!("cas `{key}` failed: {e}")))?;

        if resp.succeeded() {
            Ok(Swap::Swapped)
        } else {
            Ok(Swap::Conflict)
        }
    }
}
