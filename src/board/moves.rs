use super::{Board, Node};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

/// Knight offsets in generation order. Search order (and therefore which
/// tours a run reports first) depends on this order.
pub const KNIGHT_OFFSETS: [(i32, i32); 8] = [
    (1, 2),
    (1, -2),
    (2, 1),
    (2, -1),
    (-2, 1),
    (-2, -1),
    (-1, 2),
    (-1, -2),
];

pub type Moves = SmallVec<[Node; 8]>;

/// Knight moves from every square of one board, ignoring any path.
#[derive(Debug)]
pub struct MoveTable {
    board: Board,
    moves: Vec<Moves>,
}

static TABLES: OnceLock<Mutex<HashMap<Board, Arc<MoveTable>>>> = OnceLock::new();

impl MoveTable {
    fn build(board: Board) -> Self {
        let mut moves = Vec::with_capacity(board.area());
        for index in 0..board.area() {
            let node = board.node_at(index);
            let mut targets = Moves::new();
            for (dx, dy) in KNIGHT_OFFSETS {
                let (x, y) = (node.x as i32 + dx, node.y as i32 + dy);
                if board.contains(x, y) {
                    targets.push(Node::new(x as u8, y as u8));
                }
            }
            moves.push(targets);
        }
        Self { board, moves }
    }

    /// Shared table for `board`, built on first request and reused afterwards.
    pub fn for_board(board: Board) -> Arc<MoveTable> {
        let tables = TABLES.get_or_init(|| Mutex::new(HashMap::new()));
        // A poisoned registry only means another thread panicked mid-insert;
        // building a private table is still correct.
        match tables.lock() {
            Ok(mut g) => g.entry(board).or_insert_with(|| Arc::new(Self::build(board))).clone(),
            Err(_) => Arc::new(Self::build(board)),
        }
    }

    pub fn board(&self) -> Board { self.board }

    /// Candidate squares from `node`, in `KNIGHT_OFFSETS` order.
    pub fn moves(&self, node: Node) -> &[Node] {
        &self.moves[self.board.index(node)]
    }

    /// Candidates from the last square of `path` that the path has not visited.
    pub fn unvisited(&self, path: &[Node]) -> Moves {
        match path.last() {
            Some(&last) => self.moves(last).iter().copied().filter(|m| !path.contains(m)).collect(),
            None => Moves::new(),
        }
    }

    pub fn is_knight_move(&self, from: Node, to: Node) -> bool {
        self.moves(from).contains(&to)
    }
}
