use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use knightstour::board::Node;
use knightstour::dispatch::RayonDispatcher;
use knightstour::search::{fmt_elapsed, SharedSink, TourSink, WriterSink};
use knightstour::worker::{run_distributed, RunPlan};
use knightstour::{FrontierStore, MemoryStore, SearchConfig, SearchEngine, SharedStore};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "knightstour", version, about = "Enumerate knight's tours with a shared dead-end cache")]
struct Args {
    /// JSON config file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    width: Option<usize>,

    #[arg(long)]
    height: Option<usize>,

    /// Explore every candidate instead of only the Warnsdorff minimum
    #[arg(long, default_value_t = false)]
    brute_force: bool,

    /// Skip validation of completed tours
    #[arg(long, default_value_t = false)]
    no_checks: bool,

    /// Dead-end cache capacity (0 = unbounded)
    #[arg(long)]
    cache_size: Option<usize>,

    /// Share of the cache evicted when it is full, in percent
    #[arg(long)]
    evict_percent: Option<f64>,

    /// Stop after this many node expansions
    #[arg(long)]
    max_nodes: Option<u64>,

    /// Frontier workers (0 = single in-process search)
    #[arg(long)]
    workers: Option<usize>,

    /// Dead-end cache partitions in the shared store
    #[arg(long)]
    partitions: Option<usize>,

    /// Write tours here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

impl Args {
    fn apply(&self, cfg: &mut SearchConfig) {
        if let Some(w) = self.width { cfg.width = w; }
        if let Some(h) = self.height { cfg.height = h; }
        if self.brute_force { cfg.brute_force = true; }
        if self.no_checks { cfg.run_time_checks = false; }
        if let Some(n) = self.cache_size { cfg.cache_max_size = (n > 0).then_some(n); }
        if let Some(p) = self.evict_percent { cfg.percent_to_evict = p; }
        if self.max_nodes.is_some() { cfg.max_nodes = self.max_nodes; }
        if let Some(n) = self.workers { cfg.workers = n; }
        if let Some(n) = self.partitions { cfg.partitions = n; }
    }
}

/// Ticks a spinner for every tour before handing it on.
struct Progress<S> {
    bar: ProgressBar,
    inner: S,
}

impl<S: TourSink> TourSink for Progress<S> {
    fn tour(&mut self, number: u64, path: &[Node]) {
        self.bar.set_message(format!("{number} tours"));
        self.bar.tick();
        self.inner.tour(number, path)
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut cfg = match &args.config {
        Some(path) => SearchConfig::load(path)?,
        None => SearchConfig::default(),
    };
    args.apply(&mut cfg);
    let board = cfg.board()?;

    let out: Box<dyn Write + Send> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    let bar = if args.output.is_some() {
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
        bar.enable_steady_tick(Duration::from_millis(200));
        bar
    } else {
        ProgressBar::hidden()
    };
    let sink = Progress { bar: bar.clone(), inner: WriterSink::new(out) };

    let (tours, elapsed, sink) = if cfg.workers == 0 {
        let mut sink = sink;
        let mut engine = SearchEngine::new(board, cfg.local_cache(), cfg.params());
        let stats = engine.run(&mut sink)?;
        (stats.tours, stats.elapsed, sink)
    } else {
        let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
        let frontier = Arc::new(
            FrontierStore::new(Arc::clone(&store), &cfg.namespace)
                .with_lock(cfg.lock_config())
                .with_retry(cfg.retry_policy()),
        );
        let caches: Vec<_> = (0..cfg.workers).map(|_| cfg.sharded_cache(Arc::clone(&store))).collect();
        let dispatcher = RayonDispatcher::new(cfg.workers)?;
        let shared = SharedSink::new(sink);
        let plan = RunPlan::new(board, cfg.params(), &cfg.namespace).with_retry(cfg.retry_policy());
        let summary = run_distributed(&plan, store, frontier, caches, &dispatcher, shared.clone())?;
        let sink = shared.into_inner().context("tour sink still shared after all workers finished")?;
        (summary.tours, summary.stats.elapsed, sink)
    };

    bar.finish_and_clear();
    let written = sink.inner.written();
    sink.inner.finish().context("writing tours")?;
    eprintln!("{board}: {tours} tours ({written} written) in {}", fmt_elapsed(elapsed));
    Ok(())
}
