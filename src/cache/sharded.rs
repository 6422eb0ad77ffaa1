use super::crc16::partition_of;
use super::{CacheStats, DeadEndCache};
use crate::board::Fingerprint;
use crate::error::StoreError;
use crate::store::{LockConfig, RetryPolicy, SharedStore, StoreLock, WriteOp};
use log::debug;
use std::collections::HashSet;
use std::sync::Arc;

struct Keys {
    slots: Vec<String>,
    order: String,
    hits: String,
    misses: String,
    lock: String,
}

impl Keys {
    fn new(namespace: &str, partitions: usize) -> Self {
        let base = format!("{namespace}:dead_ends");
        Self {
            slots: (0..partitions).map(|i| format!("{base}:slot:{i}")).collect(),
            order: format!("{base}:order"),
            hits: format!("{base}:hits"),
            misses: format!("{base}:misses"),
            lock: format!("{base}:lock"),
        }
    }
}

/// Dead-end set living in a shared store so every worker prunes with the
/// same knowledge.
///
/// Keys are spread over `partitions` sets by CRC-16 of the key. Only the
/// partition touched last is mirrored locally and it is reloaded when a
/// lookup lands in another one. Insertion order is a single list shared by
/// all partitions. `add` and eviction run under one named lock and commit
/// as one write batch; lookups take no lock and may see a key another
/// worker has just evicted.
pub struct ShardedFifoSet {
    store: Arc<dyn SharedStore>,
    keys: Keys,
    max_size: Option<usize>,
    evict_count: usize,
    lock: LockConfig,
    retry: RetryPolicy,
    local: Option<(usize, HashSet<String>)>,
    reloads: u64,
}

impl ShardedFifoSet {
    pub fn new(
        store: Arc<dyn SharedStore>,
        namespace: &str,
        partitions: usize,
        max_size: Option<usize>,
        evict_count: usize,
    ) -> Self {
        Self {
            store,
            keys: Keys::new(namespace, partitions.max(1)),
            max_size,
            evict_count,
            lock: LockConfig::default(),
            retry: RetryPolicy::default(),
            local: None,
            reloads: 0,
        }
    }

    pub fn with_lock(mut self, lock: LockConfig) -> Self {
        self.lock = lock;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn partitions(&self) -> usize { self.keys.slots.len() }

    /// Partition currently mirrored in memory, if any.
    pub fn materialized(&self) -> Option<usize> { self.local.as_ref().map(|(p, _)| *p) }

    pub fn reloads(&self) -> u64 { self.reloads }

    /// Cardinality of every partition set, in partition order.
    pub fn partition_sizes(&self) -> Result<Vec<usize>, StoreError> {
        self.keys.slots.iter().map(|k| self.store.set_len(k)).collect()
    }

    pub fn cache_info(&self) -> Result<String, StoreError> {
        let stats = self.stats()?;
        Ok(format!(
            "ShardedFifoSet cache info: [{stats}, partitions: {}, materialized: {:?}, reloads: {}]",
            self.partitions(),
            self.materialized(),
            self.reloads
        ))
    }

    /// Drops the local mirror so the next lookup reads the store again.
    pub fn invalidate(&mut self) {
        self.local = None;
    }

    fn load(&mut self, partition: usize) -> Result<&HashSet<String>, StoreError> {
        if self.materialized() != Some(partition) {
            let slot = &self.keys.slots[partition];
            let store = &self.store;
            let members = self.retry.run("cache partition load", || store.set_members(slot))?;
            debug!("[loaded dead-end partition {partition}: {} keys]", members.len());
            self.reloads += 1;
            self.local = Some((partition, members.into_iter().collect()));
        }
        match &self.local {
            Some((_, set)) => Ok(set),
            None => Err(StoreError::InvalidOp("partition mirror missing after load".to_string())),
        }
    }

    /// One locked attempt. `None` when the key was already present,
    /// otherwise the keys evicted to make room.
    fn try_add(&self, key: &str, partition: usize) -> Result<Option<Vec<String>>, StoreError> {
        let guard = StoreLock::acquire(&*self.store, &self.keys.lock, self.lock)?;
        let slot = &self.keys.slots[partition];
        if self.store.set_contains(slot, key)? {
            return Ok(None);
        }
        let size = self.store.list_len(&self.keys.order)?;
        let evicted = match self.max_size {
            Some(m) if size + 1 > m => {
                let n = self.evict_count.min(size);
                self.store.list_range(&self.keys.order, 0, n)?
            }
            _ => Vec::new(),
        };
        let mut ops = Vec::with_capacity(evicted.len() * 2 + 2);
        for old in &evicted {
            ops.push(WriteOp::ListPopFront { key: self.keys.order.clone() });
            ops.push(WriteOp::SetRemove {
                key: self.keys.slots[partition_of(old, self.partitions())].clone(),
                member: old.clone(),
            });
        }
        ops.push(WriteOp::SetAdd { key: slot.clone(), member: key.to_string() });
        ops.push(WriteOp::ListPushBack { key: self.keys.order.clone(), value: key.to_string() });
        // Rejected if the lease lapsed while the eviction list was being read.
        guard.apply(&ops)?;
        Ok(Some(evicted))
    }
}

impl DeadEndCache for ShardedFifoSet {
    fn add(&mut self, fp: &Fingerprint) -> Result<(), StoreError> {
        let key = fp.to_key();
        let partition = partition_of(&key, self.partitions());
        let evicted = match self.retry.run("cache add", || self.try_add(&key, partition))? {
            Some(e) => e,
            None => return Ok(()),
        };
        if !evicted.is_empty() {
            debug!("[evicted {} dead-end keys]", evicted.len());
        }
        if let Some((p, set)) = self.local.as_mut() {
            for old in &evicted {
                set.remove(old);
            }
            if *p == partition {
                set.insert(key);
            }
        }
        Ok(())
    }

    fn contains(&mut self, fp: &Fingerprint) -> Result<bool, StoreError> {
        let key = fp.to_key();
        let partition = partition_of(&key, self.partitions());
        let hit = self.load(partition)?.contains(&key);
        let counter = if hit { &self.keys.hits } else { &self.keys.misses };
        let store = &self.store;
        self.retry.run("cache counter", || store.incr(counter, 1))?;
        Ok(hit)
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        let store = &*self.store;
        let keys = &self.keys;
        let cfg = self.lock;
        self.retry.run("cache clear", || {
            let guard = StoreLock::acquire(store, &keys.lock, cfg)?;
            let mut ops: Vec<WriteOp> = keys.slots.iter().map(|k| WriteOp::Delete { key: k.clone() }).collect();
            for k in [&keys.order, &keys.hits, &keys.misses] {
                ops.push(WriteOp::Delete { key: k.clone() });
            }
            guard.apply(&ops)
        })?;
        self.local = None;
        Ok(())
    }

    fn stats(&self) -> Result<CacheStats, StoreError> {
        Ok(CacheStats {
            size: self.store.list_len(&self.keys.order)?,
            hits: self.store.counter(&self.keys.hits)?.max(0) as u64,
            misses: self.store.counter(&self.keys.misses)?.max(0) as u64,
            max_size: self.max_size,
        })
    }

    fn max_size(&self) -> Option<usize> { self.max_size }
    fn evict_count(&self) -> usize { self.evict_count }
}
