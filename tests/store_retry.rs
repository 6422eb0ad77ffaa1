use knightstour::board::{Board, Fingerprint, Node};
use knightstour::cache::{DeadEndCache, ShardedFifoSet};
use knightstour::error::StoreError;
use knightstour::frontier::FrontierStore;
use knightstour::search::TourSink;
use knightstour::store::{LockConfig, LockToken, MemoryStore, RetryPolicy, SharedStore, WriteOp};
use knightstour::worker::GlobalNumbering;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Memory store whose next `failures` write batches (and next
/// `incr_failures` counter bumps) fail as if the connection dropped.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    failures: AtomicU32,
    incr_failures: AtomicU32,
    batches: AtomicU32,
}

fn take_failure(left: &AtomicU32) -> bool {
    left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
}

impl FlakyStore {
    fn failing(n: u32) -> Self {
        Self { failures: AtomicU32::new(n), ..Self::default() }
    }

    fn batch(&self) -> Result<(), StoreError> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.failures) {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        Ok(())
    }
}

impl SharedStore for FlakyStore {
    fn set_contains(&self, key: &str, member: &str) -> Result<bool, StoreError> { self.inner.set_contains(key, member) }
    fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> { self.inner.set_members(key) }
    fn set_len(&self, key: &str) -> Result<usize, StoreError> { self.inner.set_len(key) }
    fn list_len(&self, key: &str) -> Result<usize, StoreError> { self.inner.list_len(key) }
    fn list_range(&self, key: &str, start: usize, stop: usize) -> Result<Vec<String>, StoreError> {
        self.inner.list_range(key, start, stop)
    }
    fn incr(&self, key: &str, by: i64) -> Result<i64, StoreError> {
        if take_failure(&self.incr_failures) {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        self.inner.incr(key, by)
    }
    fn counter(&self, key: &str) -> Result<i64, StoreError> { self.inner.counter(key) }

    fn apply(&self, ops: &[WriteOp]) -> Result<(), StoreError> {
        self.batch()?;
        self.inner.apply(ops)
    }

    fn apply_locked(&self, token: &LockToken, ops: &[WriteOp]) -> Result<(), StoreError> {
        self.batch()?;
        self.inner.apply_locked(token, ops)
    }

    fn lock(&self, name: &str, lease: Duration, wait: Duration) -> Result<LockToken, StoreError> {
        self.inner.lock(name, lease, wait)
    }
    fn unlock(&self, token: &LockToken) -> Result<(), StoreError> { self.inner.unlock(token) }
}

/// Memory store whose first `list_range` stalls, long enough for a short
/// lock lease to run out mid-operation.
struct SlowStore {
    inner: MemoryStore,
    stall: Duration,
    stalled: AtomicBool,
}

impl SlowStore {
    fn new(stall: Duration) -> Self {
        Self { inner: MemoryStore::new(), stall, stalled: AtomicBool::new(false) }
    }
}

impl SharedStore for SlowStore {
    fn set_contains(&self, key: &str, member: &str) -> Result<bool, StoreError> { self.inner.set_contains(key, member) }
    fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> { self.inner.set_members(key) }
    fn set_len(&self, key: &str) -> Result<usize, StoreError> { self.inner.set_len(key) }
    fn list_len(&self, key: &str) -> Result<usize, StoreError> { self.inner.list_len(key) }
    fn list_range(&self, key: &str, start: usize, stop: usize) -> Result<Vec<String>, StoreError> {
        let range = self.inner.list_range(key, start, stop);
        if !self.stalled.swap(true, Ordering::SeqCst) {
            thread::sleep(self.stall);
        }
        range
    }
    fn incr(&self, key: &str, by: i64) -> Result<i64, StoreError> { self.inner.incr(key, by) }
    fn counter(&self, key: &str) -> Result<i64, StoreError> { self.inner.counter(key) }
    fn apply(&self, ops: &[WriteOp]) -> Result<(), StoreError> { self.inner.apply(ops) }
    fn apply_locked(&self, token: &LockToken, ops: &[WriteOp]) -> Result<(), StoreError> {
        self.inner.apply_locked(token, ops)
    }
    fn lock(&self, name: &str, lease: Duration, wait: Duration) -> Result<LockToken, StoreError> {
        self.inner.lock(name, lease, wait)
    }
    fn unlock(&self, token: &LockToken) -> Result<(), StoreError> { self.inner.unlock(token) }
}

fn fast_retry(attempts: u32) -> RetryPolicy {
    RetryPolicy { attempts, backoff: Duration::from_micros(10) }
}

fn fp(i: usize) -> Fingerprint {
    let board = Board::new(5, 5).unwrap();
    Fingerprint::of_path(board, &[board.node_at(i)])
}

#[test]
fn transient_failures_are_retried() {
    let store = Arc::new(FlakyStore::failing(2));
    let mut cache = ShardedFifoSet::new(store.clone(), "r", 2, Some(4), 1).with_retry(fast_retry(5));
    cache.add(&fp(0)).unwrap();
    assert_eq!(store.batches.load(Ordering::SeqCst), 3);
    assert!(cache.contains(&fp(0)).unwrap());
    assert_eq!(cache.stats().unwrap().size, 1);
}

#[test]
fn exhausted_retries_leave_no_partial_eviction() {
    let store = Arc::new(FlakyStore::default());
    let mut cache = ShardedFifoSet::new(store.clone(), "p", 2, Some(2), 1).with_retry(fast_retry(3));
    cache.add(&fp(0)).unwrap();
    cache.add(&fp(1)).unwrap();

    store.failures.store(3, Ordering::SeqCst);
    let err = cache.add(&fp(2)).unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
    // Neither the eviction of fp(0) nor the admission of fp(2) happened.
    assert_eq!(cache.partition_sizes().unwrap().iter().sum::<usize>(), 2);
    assert!(cache.contains(&fp(0)).unwrap());
    assert!(!cache.contains(&fp(2)).unwrap());
}

#[test]
fn held_lock_surfaces_as_timeout() {
    let store = Arc::new(MemoryStore::new());
    let lock = LockConfig { lease: Duration::from_secs(5), wait: Duration::from_millis(5) };
    let mut cache = ShardedFifoSet::new(store.clone(), "l", 1, None, 1).with_lock(lock).with_retry(fast_retry(2));
    let token = store.lock("l:dead_ends:lock", Duration::from_secs(5), Duration::ZERO).unwrap();
    assert!(matches!(cache.add(&fp(0)), Err(StoreError::LockTimeout { .. })));
    store.unlock(&token).unwrap();
    cache.add(&fp(0)).unwrap();
}

#[test]
fn frontier_push_is_retried_as_a_whole() {
    let store = Arc::new(FlakyStore::failing(1));
    let frontier = FrontierStore::new(store.clone(), "f").with_retry(fast_retry(3));
    frontier.push(&[Node::new(0, 0)], &[Node::new(1, 2), Node::new(2, 1)]).unwrap();
    assert_eq!(frontier.len().unwrap(), 1);
}

#[test]
fn eviction_after_lease_expiry_is_redone() {
    let store = Arc::new(SlowStore::new(Duration::from_millis(40)));
    // Fill the cache before arming the stall.
    let mut seed = ShardedFifoSet::new(store.clone(), "s", 2, Some(2), 1);
    seed.add(&fp(0)).unwrap();
    seed.add(&fp(1)).unwrap();
    store.stalled.store(false, Ordering::SeqCst);

    let lock = LockConfig { lease: Duration::from_millis(5), wait: Duration::from_secs(1) };
    let new_cache = || {
        ShardedFifoSet::new(store.clone(), "s", 2, Some(2), 1).with_lock(lock).with_retry(fast_retry(5))
    };
    let mut slow = new_cache();
    let mut fast = new_cache();
    let slow_add = thread::spawn(move || slow.add(&fp(2)));
    thread::sleep(Duration::from_millis(15));
    fast.add(&fp(3)).unwrap();
    slow_add.join().unwrap().unwrap();

    // The stalled add lost its lease, so its first batch was refused and it
    // evicted again from the order the other writer left behind.
    let order = store.list_range("s:dead_ends:order", 0, 10).unwrap();
    assert_eq!(order, vec![fp(3).to_key(), fp(2).to_key()]);
    let mut check = new_cache();
    assert_eq!(check.partition_sizes().unwrap().iter().sum::<usize>(), order.len());
    assert!(check.contains(&fp(2)).unwrap());
    assert!(check.contains(&fp(3)).unwrap());
    assert!(!check.contains(&fp(1)).unwrap());
}

#[test]
fn tour_numbers_survive_a_counter_hiccup() {
    let store = Arc::new(FlakyStore::default());
    store.incr_failures.store(1, Ordering::SeqCst);
    let numbers = std::cell::RefCell::new(Vec::new());
    let sink = |n: u64, _: &[Node]| numbers.borrow_mut().push(n);
    let mut numbering = GlobalNumbering::new(store.clone(), "n:tours".to_string(), sink).with_retry(fast_retry(3));
    numbering.tour(7, &[Node::new(0, 0)]);
    numbering.tour(8, &[Node::new(0, 0)]);
    assert_eq!(*numbers.borrow(), vec![1, 2]);
}

#[test]
fn unreachable_counter_leaves_tours_unnumbered() {
    let store = Arc::new(FlakyStore::default());
    store.incr_failures.store(u32::MAX, Ordering::SeqCst);
    let numbers = std::cell::RefCell::new(Vec::new());
    let sink = |n: u64, _: &[Node]| numbers.borrow_mut().push(n);
    let mut numbering = GlobalNumbering::new(store.clone(), "n:tours".to_string(), sink).with_retry(fast_retry(2));
    numbering.tour(5, &[Node::new(0, 0)]);
    assert_eq!(*numbers.borrow(), vec![0]);
    assert_eq!(store.inner.counter("n:tours").unwrap(), 0);
}
