use super::{CacheStats, DeadEndCache};
use crate::board::Fingerprint;
use crate::error::StoreError;
use std::collections::{HashSet, VecDeque};

/// In-memory dead-end set: a hash set for membership plus a queue recording
/// insertion order for eviction.
#[derive(Debug, Default)]
pub struct FifoSet {
    set: HashSet<Fingerprint>,
    order: VecDeque<Fingerprint>,
    max_size: Option<usize>,
    evict_count: usize,
    hits: u64,
    misses: u64,
}

impl FifoSet {
    pub fn new(max_size: Option<usize>, evict_count: usize) -> Self {
        Self { max_size, evict_count, ..Self::default() }
    }

    pub fn unbounded() -> Self { Self::new(None, 1) }

    pub fn len(&self) -> usize { self.set.len() }
    pub fn is_empty(&self) -> bool { self.set.is_empty() }
    pub fn hits(&self) -> u64 { self.hits }
    pub fn misses(&self) -> u64 { self.misses }

    /// Keys from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Fingerprint> {
        self.order.iter()
    }

    fn evict(&mut self) {
        let n = self.evict_count.min(self.set.len());
        for _ in 0..n {
            if let Some(old) = self.order.pop_front() {
                self.set.remove(&old);
            }
        }
    }
}

impl DeadEndCache for FifoSet {
    fn add(&mut self, fp: &Fingerprint) -> Result<(), StoreError> {
        if self.set.contains(fp) {
            return Ok(());
        }
        if matches!(self.max_size, Some(m) if self.set.len() + 1 > m) {
            self.evict();
        }
        self.set.insert(fp.clone());
        self.order.push_back(fp.clone());
        Ok(())
    }

    fn contains(&mut self, fp: &Fingerprint) -> Result<bool, StoreError> {
        let hit = self.set.contains(fp);
        if hit { self.hits += 1; } else { self.misses += 1; }
        Ok(hit)
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.set.clear();
        self.order.clear();
        self.hits = 0;
        self.misses = 0;
        Ok(())
    }

    fn stats(&self) -> Result<CacheStats, StoreError> {
        Ok(CacheStats { size: self.set.len(), hits: self.hits, misses: self.misses, max_size: self.max_size })
    }

    fn max_size(&self) -> Option<usize> { self.max_size }
    fn evict_count(&self) -> usize { self.evict_count }
}
