//! Frontier-driven search: workers pop partial paths, advance them one
//! level and push the children back until the frontier drains.

use crate::board::{Board, MoveTable, Node};
use crate::cache::DeadEndCache;
use crate::dispatch::Dispatcher;
use crate::error::SearchError;
use crate::frontier::{FrontierEntry, FrontierStore};
use crate::search::{SearchEngine, SearchParams, SearchStats, SharedSink, TourSink};
use crate::store::{RetryPolicy, SharedStore};
use log::{debug, error, info, warn};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

/// Outcome of a single worker step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Expanded { children: usize },
    /// Queue empty but another worker still holds an entry.
    Idle,
    Drained,
}

#[derive(Debug, Clone, Default)]
pub struct WorkerReport {
    pub id: usize,
    pub entries: u64,
    pub idle_polls: u64,
    pub stats: SearchStats,
}

pub struct Worker<C: DeadEndCache> {
    id: usize,
    engine: SearchEngine<C>,
    frontier: Arc<FrontierStore>,
    idle: Duration,
    entries: u64,
    idle_polls: u64,
}

impl<C: DeadEndCache> Worker<C> {
    pub fn new(id: usize, engine: SearchEngine<C>, frontier: Arc<FrontierStore>) -> Self {
        Self { id, engine, frontier, idle: Duration::from_millis(1), entries: 0, idle_polls: 0 }
    }

    /// Pause between polls while other workers hold the remaining entries.
    pub fn with_idle(mut self, idle: Duration) -> Self {
        self.idle = idle;
        self
    }

    pub fn engine(&self) -> &SearchEngine<C> { &self.engine }

    pub fn step(&mut self, sink: &mut dyn TourSink) -> Result<Step, SearchError> {
        let entry = match self.frontier.pop()? {
            Some(entry) => entry,
            None if self.frontier.is_drained()? => return Ok(Step::Drained),
            None => return Ok(Step::Idle),
        };
        debug!("[worker {}: expanding {} ({} moves)]", self.id, entry.path_key(), entry.moves.len());
        let children = match self.engine.expand_entry(&entry, sink) {
            Ok(children) => children,
            Err(e) => {
                if let Err(cleanup) = self.frontier.remove(&entry.path) {
                    warn!("[worker {}: could not retire {}: {cleanup}]", self.id, entry.path_key());
                }
                return Err(e);
            }
        };
        self.frontier.advance(&entry.path, &children)?;
        self.entries += 1;
        Ok(Step::Expanded { children: children.len() })
    }

    /// Steps until the frontier drains or the node budget runs out.
    pub fn run(mut self, sink: &mut dyn TourSink) -> Result<WorkerReport, SearchError> {
        let started = Instant::now();
        loop {
            match self.step(sink)? {
                Step::Expanded { .. } if self.engine.stats().truncated => {
                    warn!("[worker {}: node budget exhausted]", self.id);
                    break;
                }
                Step::Expanded { .. } => {}
                Step::Idle => {
                    self.idle_polls += 1;
                    thread::sleep(self.idle);
                }
                Step::Drained => break,
            }
        }
        let mut stats = self.engine.stats().clone();
        stats.elapsed = started.elapsed();
        info!(
            "[worker {} done: {} entries, {} tours, {} nodes, {} idle polls]",
            self.id, self.entries, stats.tours, stats.nodes, self.idle_polls
        );
        Ok(WorkerReport { id: self.id, entries: self.entries, idle_polls: self.idle_polls, stats })
    }
}

/// Pushes one entry per square, with every board move from it, in the same
/// order the in-process search visits roots.
pub fn seed_frontier(frontier: &FrontierStore, board: Board) -> Result<usize, SearchError> {
    let table = MoveTable::for_board(board);
    let roots: Vec<FrontierEntry> =
        board.nodes().map(|n| FrontierEntry::new(vec![n], table.moves(n).to_vec())).collect();
    frontier.push_all(&roots)?;
    Ok(roots.len())
}

/// Numbers tours through a counter in the shared store so numbers are unique
/// across workers. A tour whose number could not be drawn is passed on as
/// number 0; local numbers would collide with other workers' ones.
pub struct GlobalNumbering<S> {
    store: Arc<dyn SharedStore>,
    key: String,
    retry: RetryPolicy,
    inner: S,
}

impl<S> GlobalNumbering<S> {
    pub fn new(store: Arc<dyn SharedStore>, key: String, inner: S) -> Self {
        Self { store, key, retry: RetryPolicy::default(), inner }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl<S: TourSink> TourSink for GlobalNumbering<S> {
    fn tour(&mut self, local: u64, path: &[Node]) {
        let (store, key) = (&self.store, &self.key);
        let number = match self.retry.run("tour counter", || store.incr(key, 1)) {
            Ok(n) => n.max(0) as u64,
            Err(e) => {
                error!("[tour counter unavailable, tour {local} of this worker left unnumbered: {e}]");
                0
            }
        };
        self.inner.tour(number, path)
    }
}

/// What a distributed run searches and where its shared state lives.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub board: Board,
    pub params: SearchParams,
    pub namespace: String,
    pub idle: Duration,
    /// Used when drawing tour numbers from the shared counter.
    pub retry: RetryPolicy,
}

impl RunPlan {
    pub fn new(board: Board, params: SearchParams, namespace: &str) -> Self {
        Self {
            board,
            params,
            namespace: namespace.to_string(),
            idle: Duration::from_millis(1),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn tour_counter(&self) -> String {
        format!("{}:tours", self.namespace)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Final value of the shared tour counter.
    pub tours: u64,
    pub stats: SearchStats,
    pub reports: Vec<WorkerReport>,
}

/// Resets the shared state, seeds the frontier and runs one worker per
/// cache in `caches` through `dispatcher`.
pub fn run_distributed<C, S>(
    plan: &RunPlan,
    store: Arc<dyn SharedStore>,
    frontier: Arc<FrontierStore>,
    caches: Vec<C>,
    dispatcher: &dyn Dispatcher,
    sink: SharedSink<S>,
) -> Result<RunSummary, SearchError>
where
    C: DeadEndCache + Send + 'static,
    S: TourSink + Send + 'static,
{
    let counter = plan.tour_counter();
    let mut caches = caches;
    for cache in caches.iter_mut() {
        cache.clear()?;
    }
    frontier.clear()?;
    let stale = store.counter(&counter)?;
    if stale != 0 {
        store.incr(&counter, -stale)?;
    }
    let seeded = seed_frontier(&frontier, plan.board)?;
    info!(
        "[distributed run on {}: {} workers, {} roots, parallelism {}]",
        plan.board,
        caches.len(),
        seeded,
        dispatcher.parallelism()
    );
    run_workers(plan, store, frontier, caches, dispatcher, sink)
}

/// Runs one worker per cache against whatever the frontier already holds.
/// Returns once every worker has finished; the first worker error, if any,
/// is returned after that.
pub fn run_workers<C, S>(
    plan: &RunPlan,
    store: Arc<dyn SharedStore>,
    frontier: Arc<FrontierStore>,
    caches: Vec<C>,
    dispatcher: &dyn Dispatcher,
    sink: SharedSink<S>,
) -> Result<RunSummary, SearchError>
where
    C: DeadEndCache + Send + 'static,
    S: TourSink + Send + 'static,
{
    let started = Instant::now();
    let counter = plan.tour_counter();
    let workers = caches.len();
    let (tx, rx) = mpsc::channel();
    for (id, cache) in caches.into_iter().enumerate() {
        let tx = tx.clone();
        let engine = SearchEngine::new(plan.board, cache, plan.params);
        let worker = Worker::new(id, engine, Arc::clone(&frontier)).with_idle(plan.idle);
        let mut sink =
            GlobalNumbering::new(Arc::clone(&store), counter.clone(), sink.clone()).with_retry(plan.retry);
        dispatcher.dispatch(Box::new(move || {
            let result = worker.run(&mut sink);
            // Sink clone must be gone before the result is seen.
            drop(sink);
            let _ = tx.send(result);
        }));
    }
    drop(tx);

    let mut summary = RunSummary::default();
    let mut failure = None;
    for result in rx.iter().take(workers) {
        match result {
            Ok(report) => {
                summary.stats.merge(&report.stats);
                summary.reports.push(report);
            }
            Err(e) => {
                error!("[worker failed: {e}]");
                failure.get_or_insert(e);
            }
        }
    }
    if let Some(e) = failure {
        return Err(e);
    }
    summary.reports.sort_by_key(|r| r.id);
    summary.tours = store.counter(&counter)?.max(0) as u64;
    summary.stats.elapsed = started.elapsed();
    info!("[distributed run done: {} tours in {:?}]", summary.tours, summary.stats.elapsed);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FifoSet;
    use crate::search::CollectingSink;
    use crate::store::MemoryStore;

    #[test]
    fn seeding_covers_every_square() {
        let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
        let frontier = FrontierStore::new(store, "t");
        let board = Board::new(3, 4).unwrap();
        assert_eq!(seed_frontier(&frontier, board).unwrap(), 12);
        let first = frontier.pop().unwrap().unwrap();
        assert_eq!(first.path, vec![Node::new(0, 0)]);
        assert_eq!(first.moves, vec![Node::new(1, 2), Node::new(2, 1)]);
        assert_eq!(frontier.in_flight().unwrap(), 1);
    }

    #[test]
    fn idle_until_in_flight_entry_is_retired() {
        let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
        let frontier = Arc::new(FrontierStore::new(store, "t"));
        let board = Board::new(1, 1).unwrap();
        frontier.push(&[Node::new(0, 0)], &[]).unwrap();
        let held = frontier.pop().unwrap().unwrap();

        let engine = SearchEngine::new(board, FifoSet::unbounded(), SearchParams::default());
        let mut worker = Worker::new(0, engine, Arc::clone(&frontier));
        let mut sink = CollectingSink::default();
        assert_eq!(worker.step(&mut sink).unwrap(), Step::Idle);
        frontier.advance(&held.path, &[]).unwrap();
        assert_eq!(worker.step(&mut sink).unwrap(), Step::Drained);
    }
}
