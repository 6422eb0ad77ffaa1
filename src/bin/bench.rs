use anyhow::Result;
use clap::Parser;
use knightstour::search::{fmt_elapsed, NullSink};
use knightstour::{SearchConfig, SearchEngine};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "knightstour-bench", version, about = "Time repeated knight's tour searches")]
struct Args {
    /// JSON config file
    #[arg(long)]
    config: Option<String>,

    #[arg(long, default_value_t = 5)]
    width: usize,

    #[arg(long, default_value_t = 5)]
    height: usize,

    #[arg(long, default_value_t = false)]
    brute_force: bool,

    /// Number of timed runs
    #[arg(long, default_value_t = 10)]
    runs: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut cfg = match args.config.as_deref() {
        Some(p) => SearchConfig::load(p)?,
        None => SearchConfig { width: args.width, height: args.height, ..SearchConfig::default() },
    };
    cfg.brute_force |= args.brute_force;
    let board = cfg.board()?;

    let mut times = Vec::with_capacity(args.runs);
    let mut tours = 0;
    for run in 0..args.runs.max(1) {
        let mut engine = SearchEngine::new(board, cfg.local_cache(), cfg.params());
        let stats = engine.run(&mut NullSink)?;
        println!("run {run}: tours={} nodes={} elapsed={}", stats.tours, stats.nodes, fmt_elapsed(stats.elapsed));
        tours = stats.tours;
        times.push(stats.elapsed.as_secs_f64());
    }
    let n = times.len() as f64;
    let mean = times.iter().sum::<f64>() / n;
    let var = if times.len() > 1 { times.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / (n - 1.0) } else { 0.0 };
    println!(
        "{board} brute_force={} tours={tours} runs={} mean={} stddev={:.3}s",
        cfg.brute_force,
        times.len(),
        fmt_elapsed(Duration::from_secs_f64(mean)),
        var.sqrt()
    );
    Ok(())
}
