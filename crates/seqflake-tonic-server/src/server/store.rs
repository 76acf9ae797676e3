//! Runtime selection of the store backend.

use super::config::{ServerConfig, StoreKind};
use seqflake_tonic_core::seqflake::{
    KvStore, MachineIdSource, MemoryStore, Result, Swap, Versioned,
};

/// The store chosen by `--store`, dispatched statically per call.
#[derive(Clone, Debug)]
pub enum Backend {
    Memory(MemoryStore),
    #[cfg(feature = "etcd")]
    Etcd(seqflake_tonic_core::seqflake::EtcdStore),
}

impl Backend {
    /// Connects to (or creates) the configured store.
    ///
    /// A memory store gets the configured seed counters plus the machine id
    /// counter at `0`, so a fresh local run can start without any setup.
    pub async fn connect(config: &ServerConfig) -> anyhow::Result<Self> {
        match config.store {
            StoreKind::Memory => {
                let store = MemoryStore::new();
                for (name, value) in &config.seeds {
                    store.put(config.counter_key(name), value.to_string());
                }
                if let MachineIdSource::Store { key } = &config.machine_id {
                    store.put_if_absent(key.as_str(), "0");
                }
                tracing::warn!(
                    seeded = config.seeds.len(),
                    "using the in-memory store; counters are lost on exit"
                );
                Ok(Self::Memory(store))
            }
            #[cfg(feature = "etcd")]
            StoreKind::Etcd => {
                use anyhow::Context;

                let store = seqflake_tonic_core::seqflake::EtcdStore::connect(
                    &config.etcd_endpoints,
                    config.store_timeout,
                )
                .await
                .with_context(|| {
                    format!("failed to connect to etcd at {:?}", config.etcd_endpoints)
                })?;
                tracing::info!(endpoints = ?config.etcd_endpoints, "connected to etcd");
                Ok(Self::Etcd(store))
            }
            #[cfg(not(feature = "etcd"))]
            StoreKind::Etcd => anyhow::bail!("this build does not include the etcd backend"),
        }
    }
}

impl KvStore for Backend {
    async fn get(&self, key: &str) -> Result<Option<Versioned>> {
        match self {
            Self::Memory(store) => store.get(key).await,
            #[cfg(feature = "etcd")]
            Self::Etcd(store) => store.get(key).await,
        }
    }

    async fn compare_and_swap(&self, key: &str, value: &str, expected: i64) -> Result<Swap> {
        match self {
            Self::Memory(store) => store.compare_and_swap(key, value, expected).await,
            #[cfg(feature = "etcd")]
            Self::Etcd(store) => store.compare_and_swap(key, value, expected).await,
        }
    }
}
