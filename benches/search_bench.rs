use criterion::{black_box, criterion_group, criterion_main, Criterion};
use knightstour::board::{Board, Fingerprint, MoveTable, Node};
use knightstour::cache::{DeadEndCache, FifoSet};
use knightstour::search::{NullSink, SearchEngine, SearchParams};

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    group.sample_size(10);
    let cases = [("heuristic_5x5", 5usize, false), ("heuristic_6x6", 6, false), ("brute_5x5", 5, true)];
    for (name, n, brute_force) in cases {
        let board = Board::new(n, n).unwrap();
        let params = SearchParams { brute_force, run_time_checks: false, ..SearchParams::default() };
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut engine = SearchEngine::new(board, FifoSet::new(Some(10_000_000), 300_000), params);
                let stats = engine.run(&mut NullSink).unwrap();
                black_box(stats.tours)
            })
        });
    }
    group.finish();
}

fn bench_cache(c: &mut Criterion) {
    let board = Board::new(8, 8).unwrap();
    let table = MoveTable::for_board(board);
    // One growing path: each fingerprint has one square more than the last.
    let mut path = vec![Node::new(0, 0)];
    while path.len() < 40 {
        let fp = Fingerprint::of_path(board, &path);
        let last = path[path.len() - 1];
        match table.moves(last).iter().find(|&&m| !fp.contains(board, m)) {
            Some(&m) => path.push(m),
            None => break,
        }
    }
    let fps: Vec<Fingerprint> = (1..=path.len()).map(|i| Fingerprint::of_path(board, &path[..i])).collect();
    c.bench_function("fifo_add_contains", |b| {
        b.iter(|| {
            let mut cache = FifoSet::new(Some(16), 4);
            let mut hits = 0;
            for fp in &fps {
                cache.add(fp).unwrap();
                hits += cache.contains(black_box(fp)).unwrap() as u32;
            }
            black_box(hits)
        })
    });
}

criterion_group!(benches, bench_search, bench_cache);
criterion_main!(benches);
