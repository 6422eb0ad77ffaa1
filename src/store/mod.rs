//! Shared key/value store contract used by the distributed cache and the
//! frontier. Keys are addressed by name, so every worker holding a handle to
//! the same backend sees the same state.

pub mod memory;

use crate::error::{Retryable, StoreError};
use log::warn;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

pub use memory::MemoryStore;

/// One mutation in an atomic batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOp {
    SetAdd { key: String, member: String },
    SetRemove { key: String, member: String },
    ListPushBack { key: String, value: String },
    ListPopFront { key: String },
    Delete { key: String },
}

/// Proof of a held lock; must be handed back to `unlock`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockToken {
    pub name: String,
    pub id: u64,
}

/// The primitives a backend must offer: sets, ordered lists, counters,
/// atomic write batches and a leased named mutex.
pub trait SharedStore: Send + Sync {
    fn set_contains(&self, key: &str, member: &str) -> Result<bool, StoreError>;
    fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;
    fn set_len(&self, key: &str) -> Result<usize, StoreError>;

    fn list_len(&self, key: &str) -> Result<usize, StoreError>;
    /// Elements `start..stop` (clamped), front first.
    fn list_range(&self, key: &str, start: usize, stop: usize) -> Result<Vec<String>, StoreError>;

    /// Adds `by` and returns the new value; a missing counter starts at 0.
    fn incr(&self, key: &str, by: i64) -> Result<i64, StoreError>;
    fn counter(&self, key: &str) -> Result<i64, StoreError>;

    /// Applies every op or none of them.
    fn apply(&self, ops: &[WriteOp]) -> Result<(), StoreError>;

    /// Like `apply`, but only while `token` still holds its lease. A lapsed
    /// lease fails with `LeaseLost` and nothing is written.
    fn apply_locked(&self, token: &LockToken, ops: &[WriteOp]) -> Result<(), StoreError>;

    /// Blocks up to `wait` for `name`. The lock frees itself after `lease`
    /// if the holder never releases it.
    fn lock(&self, name: &str, lease: Duration, wait: Duration) -> Result<LockToken, StoreError>;
    fn unlock(&self, token: &LockToken) -> Result<(), StoreError>;
}

#[derive(Clone, Copy, Debug)]
pub struct LockConfig {
    pub lease: Duration,
    pub wait: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self { lease: Duration::from_millis(1000), wait: Duration::from_millis(1000) }
    }
}

/// Releases the lock when dropped.
pub struct StoreLock<'a> {
    store: &'a dyn SharedStore,
    token: Option<LockToken>,
}

impl<'a> StoreLock<'a> {
    pub fn acquire(store: &'a dyn SharedStore, name: &str, cfg: LockConfig) -> Result<Self, StoreError> {
        let token = store.lock(name, cfg.lease, cfg.wait)?;
        Ok(Self { store, token: Some(token) })
    }

    /// Applies `ops` as one batch, provided this guard still holds the lock.
    pub fn apply(&self, ops: &[WriteOp]) -> Result<(), StoreError> {
        match &self.token {
            Some(t) => self.store.apply_locked(t, ops),
            None => Err(StoreError::InvalidOp("write through a released lock".to_string())),
        }
    }

    /// Explicit release, surfacing a lost lease to the caller.
    pub fn release(mut self) -> Result<(), StoreError> {
        match self.token.take() {
            Some(t) => self.store.unlock(&t),
            None => Ok(()),
        }
    }
}

impl Drop for StoreLock<'_> {
    fn drop(&mut self) {
        if let Some(t) = self.token.take() {
            if let Err(e) = self.store.unlock(&t) {
                warn!("[lock release failed: {e}]");
            }
        }
    }
}

/// Repeats a whole store operation while it fails with a retryable error.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: 5, backoff: Duration::from_millis(2) }
    }
}

impl RetryPolicy {
    pub fn run<T, E: Retryable>(&self, what: &str, mut op: impl FnMut() -> Result<T, E>) -> Result<T, E> {
        let mut rng: Option<SmallRng> = None;
        let mut attempt = 1;
        loop {
            match op() {
                Err(e) if e.is_retryable() && attempt < self.attempts.max(1) => {
                    warn!("[{what} failed (attempt {attempt}/{}): {e}]", self.attempts);
                    // Jitter keeps workers that collided from colliding again.
                    let base = self.backoff.as_micros() as u64 * attempt as u64;
                    let jitter = rng.get_or_insert_with(SmallRng::from_entropy).gen_range(0..=base.max(1));
                    std::thread::sleep(Duration::from_micros(base + jitter));
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
