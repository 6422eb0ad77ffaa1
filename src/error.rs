use std::time::Duration;
use thiserror::Error;

/// Failures of the shared store backing the distributed cache and frontier.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("timed out after {waited:?} waiting for lock '{name}'")]
    LockTimeout { name: String, waited: Duration },
    #[error("lease on lock '{name}' is no longer held")]
    LeaseLost { name: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("rejected store operation: {0}")]
    InvalidOp(String),
}

/// Errors that may go away if the whole operation is repeated.
pub trait Retryable: std::fmt::Display {
    fn is_retryable(&self) -> bool;
}

impl Retryable for StoreError {
    fn is_retryable(&self) -> bool {
        matches!(self, StoreError::LockTimeout { .. } | StoreError::LeaseLost { .. } | StoreError::Unavailable(_))
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid board {width}x{height}: {reason}")]
    InvalidBoard { width: usize, height: usize, reason: &'static str },
    #[error("ancestor without possible moves while its child is on the path: {path}")]
    DeadEndInvariant { path: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("frontier entry decode failed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("malformed frontier entry: {0}")]
    MalformedEntry(String),
}

impl Retryable for SearchError {
    fn is_retryable(&self) -> bool {
        matches!(self, SearchError::Store(e) if e.is_retryable())
    }
}

/// Reasons a completed path is rejected by the run time checks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TourError {
    #[error("path has {len} squares, board has {expected}")]
    Length { len: usize, expected: usize },
    #[error("no knight move from {from} to {to} at index {index}")]
    IllegalMove { index: usize, from: String, to: String },
    #[error("square {square} revisited at index {index}")]
    Revisit { index: usize, square: String },
    #[error("path already generated: {0}")]
    Duplicate(String),
}
