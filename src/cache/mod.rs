//! Bounded sets of fingerprints known to lead nowhere.
//!
//! Both variants share one contract: adding an existing key is a no-op;
//! admitting a key into a full set first evicts up to `evict_count` of the
//! oldest entries, oldest first; `contains` counts hits and misses.

pub mod crc16;
pub mod fifo;
pub mod sharded;

use crate::board::Fingerprint;
use crate::error::StoreError;
use std::fmt;

pub use fifo::FifoSet;
pub use sharded::ShardedFifoSet;

pub trait DeadEndCache {
    fn add(&mut self, fp: &Fingerprint) -> Result<(), StoreError>;
    fn contains(&mut self, fp: &Fingerprint) -> Result<bool, StoreError>;
    /// Empties the set and resets the counters.
    fn clear(&mut self) -> Result<(), StoreError>;
    fn stats(&self) -> Result<CacheStats, StoreError>;
    fn max_size(&self) -> Option<usize>;
    fn evict_count(&self) -> usize;
}

impl<C: DeadEndCache + ?Sized> DeadEndCache for Box<C> {
    fn add(&mut self, fp: &Fingerprint) -> Result<(), StoreError> { (**self).add(fp) }
    fn contains(&mut self, fp: &Fingerprint) -> Result<bool, StoreError> { (**self).contains(fp) }
    fn clear(&mut self) -> Result<(), StoreError> { (**self).clear() }
    fn stats(&self) -> Result<CacheStats, StoreError> { (**self).stats() }
    fn max_size(&self) -> Option<usize> { (**self).max_size() }
    fn evict_count(&self) -> usize { (**self).evict_count() }
}

/// Evict count for a max size and an eviction percentage, never below 1.
pub fn evict_count_for(max_size: Option<usize>, percent: f64) -> usize {
    match max_size {
        Some(m) => ((m as f64 * percent / 100.0).ceil() as usize).max(1),
        None => 1,
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub max_size: Option<usize>,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 { 0.0 } else { 100.0 * self.hits as f64 / total as f64 }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hit rate %: {:.2}, hits: {}, misses: {}, size: {}",
            self.hit_rate(),
            self.hits,
            self.misses,
            self.size
        )?;
        match self.max_size {
            Some(m) => write!(f, ", maxsize: {m}"),
            None => write!(f, ", maxsize: unbounded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evict_count_rounds_up() {
        assert_eq!(evict_count_for(Some(10_000_000), 3.0), 300_000);
        assert_eq!(evict_count_for(Some(10), 3.0), 1);
        assert_eq!(evict_count_for(Some(50), 20.0), 10);
        assert_eq!(evict_count_for(None, 3.0), 1);
    }

    #[test]
    fn hit_rate_of_untouched_cache_is_zero() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
