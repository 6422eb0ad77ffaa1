use super::sink::TourSink;
use super::validate::TourValidator;
use super::fmt_elapsed;
use crate::board::moves::Moves;
use crate::board::{notation, Board, Fingerprint, MoveTable, Node};
use crate::cache::DeadEndCache;
use crate::error::SearchError;
use crate::frontier::FrontierEntry;
use log::{debug, error, info};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    /// Explore every surviving candidate. When false, only the candidates
    /// with the fewest onward moves are kept (Warnsdorff) and the rest are
    /// dropped for good.
    pub brute_force: bool,
    /// Re-check every completed tour for legality and uniqueness.
    pub run_time_checks: bool,
    /// Shortest path the dead-end cache is consulted or updated for.
    pub min_negative_path_len: usize,
    /// Stop after this many node expansions.
    pub max_nodes: Option<u64>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self { brute_force: false, run_time_checks: true, min_negative_path_len: 2, max_nodes: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub tours: u64,
    pub invalid_tours: u64,
    /// Candidate squares stepped onto.
    pub nodes: u64,
    pub dead_ends: u64,
    /// The node budget ran out before the search finished.
    pub truncated: bool,
    pub elapsed: Duration,
}

impl SearchStats {
    pub fn merge(&mut self, other: &SearchStats) {
        self.tours += other.tours;
        self.invalid_tours += other.invalid_tours;
        self.nodes += other.nodes;
        self.dead_ends += other.dead_ends;
        self.truncated |= other.truncated;
        self.elapsed = self.elapsed.max(other.elapsed);
    }

    pub fn time_per_tour(&self) -> Duration {
        self.elapsed.div_f64(self.tours.max(1) as f64)
    }
}

/// A square reachable from the current path together with its own
/// surviving candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Child {
    pub node: Node,
    pub moves: Moves,
}

struct Frame {
    children: Vec<Child>,
    next: usize,
}

/// Backtracking tour search over one board.
///
/// A partial path is *complete* when it covers the board, *dead* when no
/// candidate survives pruning and *active* otherwise. Dead paths feed the
/// dead-end cache through `back_propagate`.
pub struct SearchEngine<C: DeadEndCache> {
    board: Board,
    table: Arc<MoveTable>,
    cache: C,
    params: SearchParams,
    validator: TourValidator,
    stats: SearchStats,
}

impl<C: DeadEndCache> SearchEngine<C> {
    pub fn new(board: Board, cache: C, params: SearchParams) -> Self {
        Self {
            board,
            table: MoveTable::for_board(board),
            cache,
            params,
            validator: TourValidator::new(board),
            stats: SearchStats::default(),
        }
    }

    pub fn board(&self) -> Board { self.board }
    pub fn params(&self) -> &SearchParams { &self.params }
    pub fn stats(&self) -> &SearchStats { &self.stats }
    pub fn cache(&self) -> &C { &self.cache }
    pub fn cache_mut(&mut self) -> &mut C { &mut self.cache }
    pub fn into_cache(self) -> C { self.cache }

    pub fn reset(&mut self) -> Result<(), SearchError> {
        self.stats = SearchStats::default();
        self.validator.clear();
        self.cache.clear()?;
        Ok(())
    }

    fn log_params(&self) {
        info!("[*** ALGO PARAMETERS START ***]");
        info!("[Board size: {}]", self.board);
        info!("[Brute force: {}]", self.params.brute_force);
        info!("[Run time checks: {}]", self.params.run_time_checks);
        info!("[Min negative path len: {}]", self.params.min_negative_path_len);
        info!("[Dead-end cache max size: {:?}, evict count: {}]", self.cache.max_size(), self.cache.evict_count());
        info!("[*** ALGO PARAMETERS END ***]");
    }

    pub fn log_info(&self, what: &str) {
        match self.cache.stats() {
            Ok(s) => info!("[{what} dead-end cache info: {s}]"),
            Err(e) => info!("[{what} dead-end cache info unavailable: {e}]"),
        }
    }

    /// Searches from every square of the board, emitting each tour to `sink`.
    pub fn run(&mut self, sink: &mut dyn TourSink) -> Result<SearchStats, SearchError> {
        let started = Instant::now();
        self.log_params();
        self.reset()?;
        info!("[Start search]");
        for start in self.board.nodes() {
            if self.stats.truncated {
                break;
            }
            self.search_from(start, sink)?;
        }
        self.stats.elapsed = started.elapsed();
        info!("[# of tours found: {}]", self.stats.tours);
        self.log_info("Final");
        info!(
            "*** ALGO TOTAL TIME: {}s, per tour: {}s ***",
            fmt_elapsed(self.stats.elapsed),
            fmt_elapsed(self.stats.time_per_tour())
        );
        Ok(self.stats.clone())
    }

    /// Depth-first search of every path starting on `start`. Uses an
    /// explicit frame stack so board size never limits call depth.
    pub fn search_from(&mut self, start: Node, sink: &mut dyn TourSink) -> Result<(), SearchError> {
        let mut path = vec![start];
        let mut fp = Fingerprint::of_path(self.board, &path);
        if self.board.area() == 1 {
            self.complete(&path, sink);
            return Ok(());
        }
        let first = self.table.moves(start).to_vec();
        let children = self.expand(&mut path, &mut fp, &first, sink)?;
        let mut stack = vec![Frame { children, next: 0 }];
        while let Some(top) = stack.last_mut() {
            if self.stats.truncated {
                break;
            }
            if top.next == top.children.len() {
                stack.pop();
                if !stack.is_empty() {
                    if let Some(node) = path.pop() {
                        fp.remove(self.board, node);
                    }
                }
                continue;
            }
            let child = &top.children[top.next];
            let (node, moves) = (child.node, child.moves.clone());
            top.next += 1;
            path.push(node);
            fp.insert(self.board, node);
            let children = self.expand(&mut path, &mut fp, &moves, sink)?;
            stack.push(Frame { children, next: 0 });
        }
        Ok(())
    }

    /// Advances a frontier entry by one level and returns its children as
    /// new entries.
    pub fn expand_entry(
        &mut self,
        entry: &FrontierEntry,
        sink: &mut dyn TourSink,
    ) -> Result<Vec<FrontierEntry>, SearchError> {
        self.check_entry(entry)?;
        if entry.path.len() == self.board.area() {
            self.complete(&entry.path, sink);
            return Ok(Vec::new());
        }
        let mut path = entry.path.clone();
        let mut fp = Fingerprint::of_path(self.board, &path);
        let children = self.expand(&mut path, &mut fp, &entry.moves, sink)?;
        Ok(children
            .into_iter()
            .map(|c| {
                let mut p = path.clone();
                p.push(c.node);
                FrontierEntry::new(p, c.moves.to_vec())
            })
            .collect())
    }

    /// Rejects entries that do not describe a path on this board. Revisits
    /// inside a full-length path are left to the tour checks.
    fn check_entry(&self, entry: &FrontierEntry) -> Result<(), SearchError> {
        let malformed = |why: String| -> Result<(), SearchError> {
            Err(SearchError::MalformedEntry(format!("{why} in {}", entry.path_key())))
        };
        let area = self.board.area();
        if entry.path.is_empty() || entry.path.len() > area {
            return malformed(format!("path of {} squares on a board of {area}", entry.path.len()));
        }
        if let Some(n) = entry.path.iter().chain(&entry.moves).find(|n| !self.board.contains(n.x.into(), n.y.into())) {
            return malformed(format!("square ({}, {}) off the {} board", n.x, n.y, self.board));
        }
        if entry.path.len() < area {
            let fp = Fingerprint::of_path(self.board, &entry.path);
            if fp.count() != entry.path.len() {
                return malformed("repeated square".to_string());
            }
            if let Some(n) = entry.moves.iter().find(|&&m| fp.contains(self.board, m)) {
                return malformed(format!("move to visited square {n}"));
            }
        }
        Ok(())
    }

    /// One expansion step: steps onto every candidate, records completed
    /// tours and dead ends, and returns the children worth exploring. `path`
    /// and `fp` are restored before returning.
    pub fn expand(
        &mut self,
        path: &mut Vec<Node>,
        fp: &mut Fingerprint,
        candidates: &[Node],
        sink: &mut dyn TourSink,
    ) -> Result<Vec<Child>, SearchError> {
        let mut children = Vec::with_capacity(candidates.len());
        for &c in candidates {
            if matches!(self.params.max_nodes, Some(max) if self.stats.nodes >= max) {
                self.stats.truncated = true;
                break;
            }
            self.stats.nodes += 1;
            path.push(c);
            fp.insert(self.board, c);
            let visited = self.visit(path, fp, sink);
            path.pop();
            fp.remove(self.board, c);
            if let Some(moves) = visited? {
                children.push(Child { node: c, moves });
            }
        }
        if !self.params.brute_force {
            if let Some(min) = children.iter().map(|c| c.moves.len()).min() {
                children.retain(|c| c.moves.len() == min);
            }
        }
        Ok(children)
    }

    /// Classifies the path just extended. Returns the surviving candidates
    /// of an active path, `None` for complete and dead ones.
    fn visit(
        &mut self,
        path: &[Node],
        fp: &Fingerprint,
        sink: &mut dyn TourSink,
    ) -> Result<Option<Moves>, SearchError> {
        if path.len() == self.board.area() {
            self.complete(path, sink);
            return Ok(None);
        }
        let prune = path.len() >= self.params.min_negative_path_len;
        let mut surviving = Moves::new();
        if let Some(&last) = path.last() {
            for &m in self.table.moves(last) {
                if fp.contains(self.board, m) {
                    continue;
                }
                // Same squares in another order count as the same state; a
                // hit can drop a branch that was still viable.
                if prune && self.cache.contains(&fp.with(self.board, m))? {
                    continue;
                }
                surviving.push(m);
            }
        }
        if surviving.is_empty() {
            self.stats.dead_ends += 1;
            self.back_propagate(path, fp)?;
            return Ok(None);
        }
        Ok(Some(surviving))
    }

    /// Marks ancestors of a dead path as dead ends. Walks back while the
    /// ancestor had no move other than the one leading here, then marks the
    /// first ancestor that had a choice as well.
    pub fn back_propagate(&mut self, path: &[Node], fp: &Fingerprint) -> Result<(), SearchError> {
        let min_len = self.params.min_negative_path_len.max(2);
        let mut fp = fp.clone();
        let mut len = path.len();
        while len >= min_len {
            len -= 1;
            fp.remove(self.board, path[len]);
            let tail = path[len - 1];
            let options = self.table.moves(tail).iter().filter(|&&m| !fp.contains(self.board, m)).count();
            if options == 0 {
                let err = SearchError::DeadEndInvariant { path: notation(&path[..=len]) };
                error!("[{err}]");
                return Err(err);
            }
            if options > 1 {
                break;
            }
            self.cache.add(&fp)?;
        }
        self.cache.add(&fp)?;
        Ok(())
    }

    fn complete(&mut self, path: &[Node], sink: &mut dyn TourSink) {
        if self.params.run_time_checks {
            if let Err(e) = self.validator.check(path) {
                error!("[rejected tour {}: {e}]", notation(path));
                self.stats.invalid_tours += 1;
                return;
            }
        }
        self.stats.tours += 1;
        if self.stats.tours % 100 == 0 {
            self.log_info("Current");
        }
        debug!("[Path#{}: {}]", self.stats.tours, notation(path));
        sink.tour(self.stats.tours, path);
    }
}
