//! Distributed knight's tour enumeration: backtracking search with a shared
//! dead-end cache and a shared frontier of partial paths.

pub mod board;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod frontier;
pub mod search;
pub mod store;
pub mod worker;

pub use board::{Board, Fingerprint, MoveTable, Node};
pub use cache::{DeadEndCache, FifoSet, ShardedFifoSet};
pub use config::SearchConfig;
pub use error::{SearchError, StoreError, TourError};
pub use frontier::{FrontierEntry, FrontierStore};
pub use search::{SearchEngine, SearchParams, SearchStats};
pub use store::{MemoryStore, SharedStore};
