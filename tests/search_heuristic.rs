use knightstour::board::{Board, MoveTable};
use knightstour::cache::FifoSet;
use knightstour::search::{check_tour, CollectingSink, NullSink, SearchEngine, SearchParams};

fn default_cache() -> FifoSet {
    FifoSet::new(Some(10_000_000), 300_000)
}

#[test]
fn warnsdorff_5x5_golden_count() {
    let board = Board::new(5, 5).unwrap();
    let mut engine = SearchEngine::new(board, default_cache(), SearchParams::default());
    let mut sink = CollectingSink::default();
    let stats = engine.run(&mut sink).unwrap();
    assert_eq!(stats.tours, 320);
    assert_eq!(stats.nodes, 10_302);
    let table = MoveTable::for_board(board);
    for tour in &sink.tours {
        check_tour(&table, tour).unwrap();
    }
}

#[test]
fn warnsdorff_6x6_does_less_work_than_brute_force() {
    let board = Board::new(6, 6).unwrap();
    let mut heuristic = SearchEngine::new(board, default_cache(), SearchParams::default());
    let mut sink = CollectingSink::default();
    let h = heuristic.run(&mut sink).unwrap();
    assert_eq!(h.tours, 1974);
    assert_eq!(h.nodes, 23_503);
    assert!(!h.truncated);

    // Brute force on 6x6 runs far past this budget; hitting it is enough.
    let params = SearchParams { brute_force: true, max_nodes: Some(50_000), ..SearchParams::default() };
    let mut brute = SearchEngine::new(board, default_cache(), params);
    let b = brute.run(&mut NullSink).unwrap();
    assert!(b.truncated);
    assert!(h.nodes < b.nodes);

    let table = MoveTable::for_board(board);
    for tour in &sink.tours {
        check_tour(&table, tour).unwrap();
    }
}

#[test]
fn trivial_board_has_one_tour() {
    let mut engine = SearchEngine::new(Board::new(1, 1).unwrap(), default_cache(), SearchParams::default());
    let mut sink = CollectingSink::default();
    assert_eq!(engine.run(&mut sink).unwrap().tours, 1);
    assert_eq!(sink.tours.len(), 1);
}
