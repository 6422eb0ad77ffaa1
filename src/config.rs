use crate::board::Board;
use crate::cache::{evict_count_for, FifoSet, ShardedFifoSet};
use crate::error::SearchError;
use crate::search::SearchParams;
use crate::store::{LockConfig, RetryPolicy, SharedStore};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Run configuration. Every field has a default, so a config file only
/// needs the fields it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub width: usize,
    pub height: usize,
    pub brute_force: bool,
    pub run_time_checks: bool,
    pub min_negative_path_len: usize,
    /// `None` leaves the dead-end cache unbounded.
    pub cache_max_size: Option<usize>,
    pub percent_to_evict: f64,
    pub max_nodes: Option<u64>,
    /// 0 searches in-process; anything else runs that many frontier workers.
    pub workers: usize,
    pub partitions: usize,
    pub lock_lease_ms: u64,
    pub lock_wait_ms: u64,
    pub retry_attempts: u32,
    pub namespace: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            width: 5,
            height: 5,
            brute_force: false,
            run_time_checks: true,
            min_negative_path_len: 2,
            cache_max_size: Some(10_000_000),
            percent_to_evict: 3.0,
            max_nodes: None,
            workers: 0,
            partitions: 4,
            lock_lease_ms: 1000,
            lock_wait_ms: 1000,
            retry_attempts: 5,
            namespace: "knights_tour".to_string(),
        }
    }
}

impl SearchConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn board(&self) -> Result<Board, SearchError> {
        Board::new(self.width, self.height)
    }

    pub fn params(&self) -> SearchParams {
        SearchParams {
            brute_force: self.brute_force,
            run_time_checks: self.run_time_checks,
            min_negative_path_len: self.min_negative_path_len,
            max_nodes: self.max_nodes,
        }
    }

    pub fn evict_count(&self) -> usize {
        evict_count_for(self.cache_max_size, self.percent_to_evict)
    }

    pub fn lock_config(&self) -> LockConfig {
        LockConfig {
            lease: Duration::from_millis(self.lock_lease_ms),
            wait: Duration::from_millis(self.lock_wait_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy { attempts: self.retry_attempts.max(1), ..RetryPolicy::default() }
    }

    pub fn local_cache(&self) -> FifoSet {
        FifoSet::new(self.cache_max_size, self.evict_count())
    }

    pub fn sharded_cache(&self, store: Arc<dyn SharedStore>) -> ShardedFifoSet {
        ShardedFifoSet::new(store, &self.namespace, self.partitions, self.cache_max_size, self.evict_count())
            .with_lock(self.lock_config())
            .with_retry(self.retry_policy())
    }
}
