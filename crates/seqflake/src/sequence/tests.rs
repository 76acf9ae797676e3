use crate::{
    Error, KvStore, MemoryStore, Result, RetryPolicy, SequenceAllocator, SequenceConfig,
    StorePool, Swap, Versioned,
};
use core::time::Duration;
use std::collections::HashSet;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

/// Counts store traffic on top of a [`MemoryStore`].
#[derive(Clone, Default)]
struct CountingStore {
    inner: MemoryStore,
    gets: Arc<AtomicUsize>,
    cas: Arc<AtomicUsize>,
}

impl CountingStore {
    fn calls(&self) -> (usize, usize) {
        (self.gets.load(Ordering::SeqCst), self.cas.load(Ordering::SeqCst))
    }
}

impl KvStore for CountingStore {
    async fn get(&self, key: &str) -> Result<Option<Versioned>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn compare_and_swap(&self, key: &str, value: &str, expected: i64) -> Result<Swap> {
        self.cas.fetch_add(1, Ordering::SeqCst);
        self.inner.compare_and_swap(key, value, expected).await
    }
}

/// Fails every call as if the store were down.
#[derive(Clone, Default)]
struct DownStore {
    gets: Arc<AtomicUsize>,
}

impl KvStore for DownStore {
    async fn get(&self, _key: &str) -> Result<Option<Versioned>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Err(Error::StoreUnavailable {
            reason: "connection refused".into(),
        })
    }

    async fn compare_and_swap(&self, _key: &str, _value: &str, _expected: i64) -> Result<Swap> {
        Err(Error::StoreUnavailable {
            reason: "connection refused".into(),
        })
    }
}

fn config(step: i64, max_attempts: u32) -> SequenceConfig {
    SequenceConfig {
        prefix: "/seqs".into(),
        step,
        policy: RetryPolicy::new(max_attempts, Duration::ZERO, Duration::from_millis(1)),
    }
}

fn allocator<S: KvStore + Clone>(store: &S, step: i64) -> SequenceAllocator<S> {
    let pool = Arc::new(StorePool::replicate(store.clone(), 4));
    SequenceAllocator::new(pool, config(step, 8))
}

#[tokio::test]
async fn step_one_allocates_from_store() {
    let store = CountingStore::default();
    store.inner.put("/seqs/orders", "100");
    let alloc = allocator(&store, 1);

    assert_eq!(alloc.allocate("orders").await.unwrap(), 101);
    assert_eq!(store.inner.value("/seqs/orders").as_deref(), Some("101"));

    assert_eq!(alloc.allocate("orders").await.unwrap(), 102);
    assert_eq!(store.inner.value("/seqs/orders").as_deref(), Some("102"));
    assert_eq!(store.calls(), (2, 2));
    assert_eq!(alloc.cached("orders").await, 0);
}

#[tokio::test]
async fn step_five_drains_block_before_next_reservation() {
    let store = CountingStore::default();
    store.inner.put("/seqs/orders", "100");
    let alloc = allocator(&store, 5);

    assert_eq!(alloc.allocate("orders").await.unwrap(), 101);
    assert_eq!(store.inner.value("/seqs/orders").as_deref(), Some("105"));
    assert_eq!(store.calls(), (1, 1));
    assert_eq!(alloc.cached("orders").await, 4);

    for expected in 102..=105 {
        assert_eq!(alloc.allocate("orders").await.unwrap(), expected);
    }
    assert_eq!(store.calls(), (1, 1));
    assert_eq!(alloc.cached("orders").await, 0);

    assert_eq!(alloc.allocate("orders").await.unwrap(), 106);
    assert_eq!(store.inner.value("/seqs/orders").as_deref(), Some("110"));
    assert_eq!(store.calls(), (2, 2));
}

#[tokio::test]
async fn missing_counter_fails_without_retrying() {
    let store = CountingStore::default();
    let alloc = allocator(&store, 1);

    let err = alloc.allocate("missing").await.unwrap_err();
    assert_eq!(
        err,
        Error::NotFound {
            key: "/seqs/missing".into()
        }
    );
    assert_eq!(store.calls(), (1, 0));
}

#[tokio::test]
async fn malformed_counter_fails_without_retrying() {
    let store = CountingStore::default();
    store.inner.put("/seqs/orders", "1O0");
    let alloc = allocator(&store, 3);

    assert!(matches!(
        alloc.allocate("orders").await,
        Err(Error::Malformed { .. })
    ));
    assert_eq!(store.calls(), (1, 0));
    assert_eq!(alloc.cached("orders").await, 0);
}

#[tokio::test]
async fn failed_names_leave_no_lock_slot_behind() {
    let store = MemoryStore::new();
    store.put("/seqs/orders", "0");
    store.put("/seqs/broken", "not-a-number");
    let alloc = allocator(&store, 1);

    for i in 0..10_000 {
        assert!(matches!(
            alloc.allocate(&format!("missing-{i}")).await,
            Err(Error::NotFound { .. })
        ));
    }
    assert_eq!(alloc.tracked_names(), 0);

    assert!(matches!(
        alloc.allocate("broken").await,
        Err(Error::Malformed { .. })
    ));
    assert_eq!(alloc.tracked_names(), 0);

    assert_eq!(alloc.allocate("orders").await.unwrap(), 1);
    assert_eq!(alloc.tracked_names(), 1);
}

#[tokio::test]
async fn exhausted_block_slot_is_dropped_once_counter_is_deleted() {
    let store = MemoryStore::new();
    store.put("/seqs/jobs", "0");
    let alloc = allocator(&store, 2);

    assert_eq!(alloc.allocate("jobs").await.unwrap(), 1);
    assert_eq!(alloc.tracked_names(), 1);
    store.delete("/seqs/jobs");
    assert_eq!(alloc.allocate("jobs").await.unwrap(), 2);
    assert!(alloc.allocate("jobs").await.is_err());
    assert_eq!(alloc.tracked_names(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failures_on_one_name_clean_up() {
    let store = MemoryStore::new();
    let alloc = Arc::new(allocator(&store, 1));

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let alloc = Arc::clone(&alloc);
            tokio::spawn(async move { alloc.allocate("ghost").await })
        })
        .collect();
    for task in tasks {
        assert!(matches!(task.await.unwrap(), Err(Error::NotFound { .. })));
    }
    assert_eq!(alloc.tracked_names(), 0);
}

#[tokio::test]
async fn unreachable_store_gives_up_after_budget() {
    let store = DownStore::default();
    let pool = Arc::new(StorePool::replicate(store.clone(), 2));
    let alloc = SequenceAllocator::new(Arc::clone(&pool), config(1, 3));

    assert!(matches!(
        alloc.allocate("orders").await,
        Err(Error::StoreUnavailable { .. })
    ));
    assert_eq!(store.gets.load(Ordering::SeqCst), 3);
    assert_eq!(pool.idle(), 2);
}

#[tokio::test]
async fn closed_pool_reports_unavailable() {
    let store = MemoryStore::new();
    store.put("/seqs/orders", "1");
    let pool = Arc::new(StorePool::replicate(store, 1));
    let alloc = SequenceAllocator::new(Arc::clone(&pool), config(1, 3));

    pool.close();
    assert!(matches!(
        alloc.allocate("orders").await,
        Err(Error::StoreUnavailable { .. })
    ));
}

#[tokio::test]
async fn deleted_counter_surfaces_not_found_even_with_cache() {
    let store = MemoryStore::new();
    store.put("/seqs/jobs", "0");
    let alloc = allocator(&store, 2);

    assert_eq!(alloc.allocate("jobs").await.unwrap(), 1);
    store.delete("/seqs/jobs");
    // Cached values are still valid reservations.
    assert_eq!(alloc.allocate("jobs").await.unwrap(), 2);
    assert!(matches!(
        alloc.allocate("jobs").await,
        Err(Error::NotFound { .. })
    ));
}

#[tokio::test]
async fn names_are_independent() {
    let store = MemoryStore::new();
    store.put("/seqs/a", "0");
    store.put("/seqs/b", "1000");
    let alloc = allocator(&store, 3);

    assert_eq!(alloc.allocate("a").await.unwrap(), 1);
    assert_eq!(alloc.allocate("b").await.unwrap(), 1001);
    assert_eq!(alloc.allocate("a").await.unwrap(), 2);
    assert_eq!(store.value("/seqs/a").as_deref(), Some("3"));
    assert_eq!(store.value("/seqs/b").as_deref(), Some("1003"));
}

#[test]
fn prefix_trailing_slash_is_ignored() {
    let pool = Arc::new(StorePool::replicate(MemoryStore::new(), 1));
    let alloc = SequenceAllocator::new(
        pool,
        SequenceConfig {
            prefix: "/counters/".into(),
            step: 0,
            ..SequenceConfig::default()
        },
    );
    assert_eq!(alloc.key_for("orders"), "/counters/orders");
    assert_eq!(alloc.step(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_never_share_a_value() {
    const TASKS: i64 = 64;

    for step in [1, 3] {
        let store = MemoryStore::new();
        store.put("/seqs/orders", "100");
        let alloc = Arc::new(allocator(&store, step));

        let handles: Vec<_> = (0..TASKS)
            .map(|_| {
                let alloc = Arc::clone(&alloc);
                tokio::spawn(async move { alloc.allocate("orders").await.unwrap() })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            assert!(seen.insert(handle.await.unwrap()));
        }

        let expected: HashSet<i64> = (101..=100 + TASKS).collect();
        assert_eq!(seen, expected, "step {step}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn competing_instances_never_share_a_value() {
    const PER_INSTANCE: usize = 50;

    let store = MemoryStore::new();
    store.put("/seqs/orders", "100");

    // Each allocator plays a separate process: own lock, own pool, shared
    // store, so they only coordinate through CAS.
    let instances: Vec<_> = (0..3)
        .map(|_| {
            let pool = Arc::new(StorePool::replicate(store.clone(), 2));
            Arc::new(SequenceAllocator::new(pool, config(2, 1_000)))
        })
        .collect();

    let mut handles = Vec::new();
    for alloc in &instances {
        for _ in 0..PER_INSTANCE {
            let alloc = Arc::clone(alloc);
            handles.push(tokio::spawn(
                async move { alloc.allocate("orders").await.unwrap() },
            ));
        }
    }

    let mut seen = HashSet::new();
    for handle in handles {
        assert!(seen.insert(handle.await.unwrap()));
    }
    assert_eq!(seen.len(), PER_INSTANCE * instances.len());

    // Every value handed out lies within what the store has reserved.
    let reserved: i64 = store.value("/seqs/orders").unwrap().parse().unwrap();
    assert!(seen.iter().all(|v| (101..=reserved).contains(v)));
}
