use super::{LockToken, SharedStore, WriteOp};
use crate::error::StoreError;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Default)]
struct Data {
    sets: HashMap<String, HashSet<String>>,
    lists: HashMap<String, VecDeque<String>>,
    counters: HashMap<String, i64>,
}

struct Lease {
    id: u64,
    expires: Instant,
}

/// In-process backend. Clone an `Arc<MemoryStore>` into every worker thread
/// to share state the way separate processes would share a network store.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<Data>,
    leases: Mutex<HashMap<String, Lease>>,
    released: Condvar,
    next_id: AtomicU64,
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("memory store mutex poisoned".to_string())
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    fn data(&self) -> Result<MutexGuard<'_, Data>, StoreError> {
        self.data.lock().map_err(poisoned)
    }
}

impl Data {
    fn run(&mut self, op: &WriteOp) {
        match op {
            WriteOp::SetAdd { key, member } => {
                self.sets.entry(key.clone()).or_default().insert(member.clone());
            }
            WriteOp::SetRemove { key, member } => {
                if let Some(s) = self.sets.get_mut(key) {
                    s.remove(member);
                }
            }
            WriteOp::ListPushBack { key, value } => {
                self.lists.entry(key.clone()).or_default().push_back(value.clone());
            }
            WriteOp::ListPopFront { key } => {
                if let Some(l) = self.lists.get_mut(key) {
                    l.pop_front();
                }
            }
            WriteOp::Delete { key } => {
                self.sets.remove(key);
                self.lists.remove(key);
                self.counters.remove(key);
            }
        }
    }

    /// Applies every op or none of them.
    fn apply(&mut self, ops: &[WriteOp]) -> Result<(), StoreError> {
        // Track list lengths through the batch first so a bad op late in the
        // batch cannot leave earlier ones applied.
        let mut pending: HashMap<&str, usize> = HashMap::new();
        for op in ops {
            match op {
                WriteOp::ListPopFront { key } => {
                    let have = self.lists.get(key).map_or(0, |l| l.len());
                    let len = pending.entry(key.as_str()).or_insert(have);
                    if *len == 0 {
                        return Err(StoreError::InvalidOp(format!("pop from empty list '{key}'")));
                    }
                    *len -= 1;
                }
                WriteOp::ListPushBack { key, .. } => {
                    let have = self.lists.get(key).map_or(0, |l| l.len());
                    *pending.entry(key.as_str()).or_insert(have) += 1;
                }
                WriteOp::Delete { key } => {
                    pending.insert(key.as_str(), 0);
                }
                _ => {}
            }
        }
        for op in ops {
            self.run(op);
        }
        Ok(())
    }
}

impl SharedStore for MemoryStore {
    fn set_contains(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        Ok(self.data()?.sets.get(key).map_or(false, |s| s.contains(member)))
    }

    fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.data()?.sets.get(key).map(|s| s.iter().cloned().collect()).unwrap_or_default())
    }

    fn set_len(&self, key: &str) -> Result<usize, StoreError> {
        Ok(self.data()?.sets.get(key).map_or(0, |s| s.len()))
    }

    fn list_len(&self, key: &str) -> Result<usize, StoreError> {
        Ok(self.data()?.lists.get(key).map_or(0, |l| l.len()))
    }

    fn list_range(&self, key: &str, start: usize, stop: usize) -> Result<Vec<String>, StoreError> {
        let g = self.data()?;
        Ok(match g.lists.get(key) {
            Some(l) => l.iter().skip(start).take(stop.saturating_sub(start)).cloned().collect(),
            None => Vec::new(),
        })
    }

    fn incr(&self, key: &str, by: i64) -> Result<i64, StoreError> {
        let mut g = self.data()?;
        let v = g.counters.entry(key.to_string()).or_insert(0);
        *v += by;
        Ok(*v)
    }

    fn counter(&self, key: &str) -> Result<i64, StoreError> {
        Ok(self.data()?.counters.get(key).copied().unwrap_or(0))
    }

    fn apply(&self, ops: &[WriteOp]) -> Result<(), StoreError> {
        self.data()?.apply(ops)
    }

    fn apply_locked(&self, token: &LockToken, ops: &[WriteOp]) -> Result<(), StoreError> {
        // The lease map stays locked until the batch is in, so the lease
        // cannot be taken over between the check and the write.
        let leases = self.leases.lock().map_err(poisoned)?;
        let held = matches!(leases.get(&token.name), Some(l) if l.id == token.id && l.expires > Instant::now());
        if !held {
            return Err(StoreError::LeaseLost { name: token.name.clone() });
        }
        let result = self.data()?.apply(ops);
        drop(leases);
        result
    }

    fn lock(&self, name: &str, lease: Duration, wait: Duration) -> Result<LockToken, StoreError> {
        let started = Instant::now();
        let deadline = started + wait;
        let mut leases = self.leases.lock().map_err(poisoned)?;
        loop {
            let now = Instant::now();
            let free = match leases.get(name) {
                None => true,
                Some(l) => l.expires <= now,
            };
            if free {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                leases.insert(name.to_string(), Lease { id, expires: now + lease });
                return Ok(LockToken { name: name.to_string(), id });
            }
            if now >= deadline {
                return Err(StoreError::LockTimeout { name: name.to_string(), waited: started.elapsed() });
            }
            // Wake up at whichever comes first: the deadline or lease expiry.
            let expires = leases.get(name).map_or(deadline, |l| l.expires);
            let sleep = deadline.min(expires).saturating_duration_since(now);
            let (g, _) = self.released.wait_timeout(leases, sleep).map_err(poisoned)?;
            leases = g;
        }
    }

    fn unlock(&self, token: &LockToken) -> Result<(), StoreError> {
        let mut leases = self.leases.lock().map_err(poisoned)?;
        let held = matches!(leases.get(&token.name), Some(l) if l.id == token.id);
        if !held {
            return Err(StoreError::LeaseLost { name: token.name.clone() });
        }
        leases.remove(&token.name);
        drop(leases);
        self.released.notify_all();
        Ok(())
    }
}
