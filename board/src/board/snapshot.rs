use std::fmt;

use super::types::{Position, Token};

/// Copy of the grid taken under the board lock; safe to hand to a renderer
/// while a cascade keeps running.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoardSnapshot {
    dimension: usize,
    cells: Vec<Option<Token>>,
}

impl BoardSnapshot {
    pub(crate) fn new(dimension: usize, cells: Vec<Option<Token>>) -> Self {
        Self { dimension, cells }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn get(&self, pos: Position) -> Option<Token> {
        if pos.x >= self.dimension || pos.y >= self.dimension {
            return None;
        }
        self.cells[pos.y * self.dimension + pos.x]
    }

    pub fn empty_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_none()).count()
    }

    /// One string per row, a color letter per token and `.` for empty cells.
    pub fn rows(&self) -> Vec<String> {
        if self.dimension == 0 {
            return Vec::new();
        }
        self.cells
            .chunks(self.dimension)
            .map(|row| {
                row.iter()
                    .map(|cell| cell.map_or('.', |token| token.color().symbol()))
                    .collect()
            })
            .collect()
    }
}

impl fmt::Display for BoardSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            writeln!(f, "{}", row)?;
        }
        Ok(())
    }
}
