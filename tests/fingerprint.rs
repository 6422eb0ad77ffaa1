use knightstour::board::{Board, Fingerprint, Node};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

fn path(coords: &[(u8, u8)]) -> Vec<Node> {
    coords.iter().map(|&(x, y)| Node::new(x, y)).collect()
}

#[test]
fn order_of_visits_does_not_matter() {
    let board = Board::new(5, 5).unwrap();
    let p = path(&[(0, 0), (1, 2), (2, 4), (4, 3), (3, 1)]);
    let fp = Fingerprint::of_path(board, &p);

    let mut rev = p.clone();
    rev.reverse();
    assert_eq!(Fingerprint::of_path(board, &rev), fp);

    let mut rng = SmallRng::seed_from_u64(7);
    for _ in 0..20 {
        let mut shuffled = p.clone();
        shuffled.shuffle(&mut rng);
        assert_eq!(Fingerprint::of_path(board, &shuffled), fp);
    }
}

#[test]
fn different_squares_give_different_fingerprints() {
    let board = Board::new(10, 10).unwrap();
    let a = Fingerprint::of_path(board, &path(&[(0, 0), (1, 2)]));
    let b = Fingerprint::of_path(board, &path(&[(0, 0), (2, 1)]));
    assert_ne!(a, b);
    assert_ne!(a.to_key(), b.to_key());
    assert_eq!(a.count(), 2);
}

#[test]
fn large_boards_use_more_than_one_word() {
    let board = Board::new(12, 12).unwrap();
    let fp = Fingerprint::of_path(board, &path(&[(11, 11)]));
    assert_eq!(fp.bit_width(), 192);
    assert!(fp.contains(board, Node::new(11, 11)));
    assert!(!fp.contains(board, Node::new(0, 0)));
    let key = fp.to_key();
    assert_eq!(key.parse::<Fingerprint>().unwrap(), fp);
}
