//! Fire-and-forget execution of work units, used to drive worker loops and
//! to compute fingerprints away from the caller.

use crate::board::{Board, Fingerprint, Node};
use anyhow::{Context, Result};
use log::debug;
use std::sync::mpsc;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub trait Dispatcher: Send + Sync {
    /// Queues `job`. It runs eventually; no result comes back except through
    /// whatever channel the job itself captured.
    fn dispatch(&self, job: Job);

    /// Number of jobs that may run at once.
    fn parallelism(&self) -> usize;
}

/// Runs jobs on a dedicated rayon pool.
pub struct RayonDispatcher {
    pool: rayon::ThreadPool,
}

impl RayonDispatcher {
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("knightstour-worker-{i}"))
            .build()
            .context("building worker thread pool")?;
        debug!("[dispatch pool with {} threads]", pool.current_num_threads());
        Ok(Self { pool })
    }
}

impl Dispatcher for RayonDispatcher {
    fn dispatch(&self, job: Job) {
        self.pool.spawn(job);
    }

    fn parallelism(&self) -> usize {
        self.pool.current_num_threads()
    }
}

/// Runs every job on the calling thread before `dispatch` returns.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn dispatch(&self, job: Job) {
        job()
    }

    fn parallelism(&self) -> usize { 1 }
}

/// Computes the fingerprint of `path` through `dispatcher`; the result
/// arrives on the returned channel.
pub fn fingerprint_remote(dispatcher: &dyn Dispatcher, board: Board, path: Vec<Node>) -> mpsc::Receiver<Fingerprint> {
    let (tx, rx) = mpsc::channel();
    dispatcher.dispatch(Box::new(move || {
        // The receiver may have given up; nothing to report then.
        let _ = tx.send(Fingerprint::of_path(board, &path));
    }));
    rx
}
