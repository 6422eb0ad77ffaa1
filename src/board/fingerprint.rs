//! Order-independent path signatures.
//!
//! Bit `y * width + x` is set for every visited square, so a path, its
//! reverse and any reordering of the same squares share one fingerprint.
//! The dead-end cache relies on exactly that.

use super::{Board, Node};
use smallvec::{smallvec, SmallVec};
use std::fmt;
use std::str::FromStr;

const WORD_BITS: usize = 64;

/// Fixed-width bitset over the squares of a board. The width is
/// `64 * ceil(area / 64)` bits and is decided once from the board.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    words: SmallVec<[u64; 2]>,
}

impl Fingerprint {
    /// The empty set for `board`.
    pub fn empty(board: Board) -> Self {
        let words = (board.area() + WORD_BITS - 1) / WORD_BITS;
        Self { words: smallvec![0; words] }
    }

    pub fn of_path(board: Board, path: &[Node]) -> Self {
        let mut fp = Self::empty(board);
        for &node in path {
            fp.insert(board, node);
        }
        fp
    }

    /// Number of bits available; never smaller than the board area.
    pub fn bit_width(&self) -> usize {
        self.words.len() * WORD_BITS
    }

    pub fn insert(&mut self, board: Board, node: Node) {
        let i = board.index(node);
        self.words[i / WORD_BITS] |= 1u64 << (i % WORD_BITS);
    }

    pub fn remove(&mut self, board: Board, node: Node) {
        let i = board.index(node);
        self.words[i / WORD_BITS] &= !(1u64 << (i % WORD_BITS));
    }

    pub fn contains(&self, board: Board, node: Node) -> bool {
        let i = board.index(node);
        self.words[i / WORD_BITS] & (1u64 << (i % WORD_BITS)) != 0
    }

    /// Copy with one more square set.
    pub fn with(&self, board: Board, node: Node) -> Self {
        let mut fp = self.clone();
        fp.insert(board, node);
        fp
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Store key: lowercase hex, most significant word first, no padding on
    /// the leading word.
    pub fn to_key(&self) -> String {
        let mut out = String::with_capacity(self.words.len() * 16);
        let mut started = false;
        for &w in self.words.iter().rev() {
            if started {
                out.push_str(&format!("{w:016x}"));
            } else if w != 0 {
                out.push_str(&format!("{w:x}"));
                started = true;
            }
        }
        if !started {
            out.push('0');
        }
        // Word count travels with the key so equal sets on different board
        // sizes never alias.
        format!("{}:{}", self.words.len(), out)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_key())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseFingerprintError;

impl fmt::Display for ParseFingerprintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("malformed fingerprint key")
    }
}

impl std::error::Error for ParseFingerprintError {}

impl FromStr for Fingerprint {
    type Err = ParseFingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (words, hex) = s.split_once(':').ok_or(ParseFingerprintError)?;
        let words: usize = words.parse().map_err(|_| ParseFingerprintError)?;
        if words == 0 || hex.is_empty() || hex.len() > words * 16 {
            return Err(ParseFingerprintError);
        }
        let mut out: SmallVec<[u64; 2]> = smallvec![0; words];
        let bytes = hex.as_bytes();
        // Walk 16 hex digits at a time from the least significant end.
        for (i, chunk) in bytes.rchunks(16).enumerate() {
            let chunk = std::str::from_utf8(chunk).map_err(|_| ParseFingerprintError)?;
            out[i] = u64::from_str_radix(chunk, 16).map_err(|_| ParseFingerprintError)?;
        }
        Ok(Self { words: out })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_layout_is_row_major() {
        let b = Board::new(5, 5).unwrap();
        let fp = Fingerprint::of_path(b, &[Node::new(0, 0), Node::new(2, 1)]);
        assert_eq!(fp.to_key(), format!("1:{:x}", 1u64 | 1 << 7));
    }

    #[test]
    fn wide_boards_use_more_words() {
        let b = Board::new(9, 9).unwrap();
        let mut fp = Fingerprint::empty(b);
        assert_eq!(fp.bit_width(), 128);
        fp.insert(b, Node::new(8, 8));
        assert!(fp.contains(b, Node::new(8, 8)));
        let key = format!("2:10000{}", "0".repeat(16));
        assert_eq!(fp.to_key(), key);
        assert_eq!(key.parse::<Fingerprint>().unwrap(), fp);
    }

    #[test]
    fn remove_clears_only_that_square() {
        let b = Board::new(8, 8).unwrap();
        let mut fp = Fingerprint::of_path(b, &[Node::new(0, 0), Node::new(1, 2)]);
        fp.remove(b, Node::new(1, 2));
        assert_eq!(fp, Fingerprint::of_path(b, &[Node::new(0, 0)]));
    }

    #[test]
    fn rejects_garbage_keys() {
        assert!("".parse::<Fingerprint>().is_err());
        assert!("1:".parse::<Fingerprint>().is_err());
        assert!("1:xyz".parse::<Fingerprint>().is_err());
        assert!("1:11111111111111111".parse::<Fingerprint>().is_err());
    }
}
