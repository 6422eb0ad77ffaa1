use crate::board::{notation, Board, Fingerprint, MoveTable, Node};
use crate::error::TourError;
use std::collections::HashSet;
use std::sync::Arc;

/// Checks that `path` covers the whole board with legal knight moves and
/// never revisits a square.
pub fn check_tour(table: &MoveTable, path: &[Node]) -> Result<(), TourError> {
    let board = table.board();
    if path.len() != board.area() {
        return Err(TourError::Length { len: path.len(), expected: board.area() });
    }
    let mut seen = Fingerprint::empty(board);
    for (i, &node) in path.iter().enumerate() {
        if i > 0 && !table.is_knight_move(path[i - 1], node) {
            return Err(TourError::IllegalMove { index: i, from: path[i - 1].to_string(), to: node.to_string() });
        }
        if seen.contains(board, node) {
            return Err(TourError::Revisit { index: i, square: node.to_string() });
        }
        seen.insert(board, node);
    }
    Ok(())
}

/// Run time check of completed tours: legality plus uniqueness against
/// every tour accepted so far.
pub struct TourValidator {
    table: Arc<MoveTable>,
    generated: HashSet<Vec<Node>>,
}

impl TourValidator {
    pub fn new(board: Board) -> Self {
        Self { table: MoveTable::for_board(board), generated: HashSet::new() }
    }

    pub fn check(&mut self, path: &[Node]) -> Result<(), TourError> {
        check_tour(&self.table, path)?;
        if !self.generated.insert(path.to_vec()) {
            return Err(TourError::Duplicate(notation(path)));
        }
        Ok(())
    }

    pub fn len(&self) -> usize { self.generated.len() }
    pub fn is_empty(&self) -> bool { self.generated.is_empty() }

    pub fn clear(&mut self) {
        self.generated.clear();
    }
}
