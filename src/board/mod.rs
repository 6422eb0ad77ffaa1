pub mod fingerprint;
pub mod moves;

use crate::error::SearchError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use fingerprint::Fingerprint;
pub use moves::MoveTable;

/// Columns are lettered, so a board is at most 26 squares wide.
pub const MAX_WIDTH: usize = 26;
pub const MAX_HEIGHT: usize = 255;

/// A square on the board, `x` is the column and `y` the row (both 0-based).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Node {
    pub x: u8,
    pub y: u8,
}

impl Node {
    pub const fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let column = char::from_u32(u32::from(b'a') + u32::from(self.x)).unwrap_or('?');
        write!(f, "{}{}", column, u32::from(self.y) + 1)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Board {
    width: u8,
    height: u8,
}

impl Board {
    pub fn new(width: usize, height: usize) -> Result<Self, SearchError> {
        let invalid = |reason| SearchError::InvalidBoard { width, height, reason };
        if width == 0 || height == 0 {
            return Err(invalid("dimensions must be positive"));
        }
        if width > MAX_WIDTH {
            return Err(invalid("at most 26 columns can be lettered"));
        }
        if height > MAX_HEIGHT {
            return Err(invalid("at most 255 rows are supported"));
        }
        Ok(Self { width: width as u8, height: height as u8 })
    }

    pub fn width(&self) -> usize { self.width as usize }
    pub fn height(&self) -> usize { self.height as usize }
    pub fn area(&self) -> usize { self.width() * self.height() }

    /// Bit index of a square in a fingerprint.
    pub fn index(&self, node: Node) -> usize {
        node.y as usize * self.width() + node.x as usize
    }

    pub fn node_at(&self, index: usize) -> Node {
        Node::new((index % self.width()) as u8, (index / self.width()) as u8)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width() && (y as usize) < self.height()
    }

    /// Every square, column by column (x outer, y inner). This is the order
    /// in which searches are started.
    pub fn nodes(&self) -> impl Iterator<Item = Node> {
        let (width, height) = (self.width, self.height);
        (0..width).flat_map(move |x| (0..height).map(move |y| Node::new(x, y)))
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Renders a path as concatenated squares, e.g. `a1c2e1`.
pub fn notation(path: &[Node]) -> String {
    let mut out = String::with_capacity(path.len() * 3);
    for node in path {
        out.push_str(&node.to_string());
    }
    out
}
