//! Shared queue of partial paths that still have unexplored moves.
//!
//! Entries are serialized as JSON records with a fixed shape. A popped entry
//! is recorded as in flight until its worker calls `remove` (or `advance`);
//! there is no acknowledgement beyond that, so a worker dying mid-entry
//! loses the branch.

use crate::board::{notation, Node};
use crate::error::{SearchError, StoreError};
use crate::store::{LockConfig, RetryPolicy, SharedStore, StoreLock, WriteOp};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrontierEntry {
    pub path: Vec<Node>,
    /// Remaining candidates from the last square of `path`.
    pub moves: Vec<Node>,
}

impl FrontierEntry {
    pub fn new(path: Vec<Node>, moves: Vec<Node>) -> Self {
        Self { path, moves }
    }

    pub fn encode(&self) -> Result<String, SearchError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> Result<Self, SearchError> {
        let entry: FrontierEntry = serde_json::from_str(raw)?;
        if entry.path.is_empty() {
            return Err(SearchError::MalformedEntry(format!("empty path in {raw}")));
        }
        Ok(entry)
    }

    /// Key identifying this entry's path in the in-flight set.
    pub fn path_key(&self) -> String {
        notation(&self.path)
    }
}

struct Keys {
    queue: String,
    in_flight: String,
    lock: String,
}

pub struct FrontierStore {
    store: Arc<dyn SharedStore>,
    keys: Keys,
    lock: LockConfig,
    retry: RetryPolicy,
}

impl FrontierStore {
    pub fn new(store: Arc<dyn SharedStore>, namespace: &str) -> Self {
        let base = format!("{namespace}:frontier");
        Self {
            store,
            keys: Keys {
                queue: format!("{base}:queue"),
                in_flight: format!("{base}:in_flight"),
                lock: format!("{base}:lock"),
            },
            lock: LockConfig::default(),
            retry: RetryPolicy::default(),
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

    /// Runs `op` under the frontier lock; writes go through the guard so a
    /// lapsed lease fails the attempt instead of committing.
    fn locked<T>(&self, what: &str, op: impl Fn(&StoreLock<'_>) -> Result<T, SearchError>) -> Result<T, SearchError> {
        self.retry.run(what, || {
            let guard = StoreLock::acquire(&*self.store, &self.keys.lock, self.lock)?;
            op(&guard)
        })
    }

    fn push_ops(&self, entries: &[FrontierEntry]) -> Result<Vec<WriteOp>, SearchError> {
        entries
            .iter()
            .map(|e| Ok(WriteOp::ListPushBack { key: self.keys.queue.clone(), value: e.encode()? }))
            .collect()
    }

    pub fn push(&self, path: &[Node], moves: &[Node]) -> Result<(), SearchError> {
        self.push_all(&[FrontierEntry::new(path.to_vec(), moves.to_vec())])
    }

    pub fn push_all(&self, entries: &[FrontierEntry]) -> Result<(), SearchError> {
        if entries.is_empty() {
            return Ok(());
        }
        let ops = self.push_ops(entries)?;
        self.locked("frontier push", |guard| Ok(guard.apply(&ops)?))
    }

    /// Takes the oldest entry, or `None` when the queue is empty. Two
    /// concurrent pops never return the same entry.
    pub fn pop(&self) -> Result<Option<FrontierEntry>, SearchError> {
        self.locked("frontier pop", |guard| {
            let head = self.store.list_range(&self.keys.queue, 0, 1)?;
            let raw = match head.first() {
                Some(raw) => raw,
                None => return Ok(None),
            };
            let entry = FrontierEntry::decode(raw)?;
            guard.apply(&[
                WriteOp::ListPopFront { key: self.keys.queue.clone() },
                WriteOp::SetAdd { key: self.keys.in_flight.clone(), member: entry.path_key() },
            ])?;
            Ok(Some(entry))
        })
    }

    /// Drops the in-flight record of an exhausted entry.
    pub fn remove(&self, path: &[Node]) -> Result<(), SearchError> {
        let member = notation(path);
        self.locked("frontier remove", |guard| {
            Ok(guard.apply(&[WriteOp::SetRemove { key: self.keys.in_flight.clone(), member: member.clone() }])?)
        })
    }

    /// Publishes the children of `path` and retires `path` in one batch.
    pub fn advance(&self, path: &[Node], children: &[FrontierEntry]) -> Result<(), SearchError> {
        let mut ops = self.push_ops(children)?;
        ops.push(WriteOp::SetRemove { key: self.keys.in_flight.clone(), member: notation(path) });
        self.locked("frontier advance", |guard| Ok(guard.apply(&ops)?))
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        self.store.list_len(&self.keys.queue)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    pub fn in_flight(&self) -> Result<usize, StoreError> {
        self.store.set_len(&self.keys.in_flight)
    }

    /// Nothing queued and nothing being worked on: the search is over.
    pub fn is_drained(&self) -> Result<bool, SearchError> {
        self.locked("frontier drained check", |_| {
            Ok(self.store.list_len(&self.keys.queue)? == 0 && self.store.set_len(&self.keys.in_flight)? == 0)
        })
    }

    pub fn clear(&self) -> Result<(), SearchError> {
        self.locked("frontier clear", |guard| {
            Ok(guard.apply(&[
                WriteOp::Delete { key: self.keys.queue.clone() },
                WriteOp::Delete { key: self.keys.in_flight.clone() },
            ])?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_untyped_payloads() {
        assert!(matches!(FrontierEntry::decode("([(0, 0)], [(1, 2)])"), Err(SearchError::Decode(_))));
        assert!(matches!(
            FrontierEntry::decode(r#"{"path":[],"moves":[]}"#),
            Err(SearchError::MalformedEntry(_))
        ));
        assert!(FrontierEntry::decode(r#"{"path":[{"x":0,"y":0}],"moves":[],"extra":1}"#).is_err());
    }

    #[test]
    fn encoding_is_a_fixed_shape_record() {
        let e = FrontierEntry::new(vec![Node::new(0, 0)], vec![Node::new(1, 2)]);
        assert_eq!(e.encode().unwrap(), r#"{"path":[{"x":0,"y":0}],"moves":[{"x":1,"y":2}]}"#);
    }
}
