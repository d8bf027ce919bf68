use std::collections::HashMap;

use super::types::{Placement, Position, Token, TokenId};

/// Square grid of optional tokens plus the reverse token -> position index.
///
/// Every mutation goes through `place`, `swap`, `drain` or `resize`, which
/// keep both directions in agreement: an occupied cell at `p` holds `t` iff
/// `position_of(t.id()) == Some(p)`.
#[derive(Clone, Debug)]
pub struct Grid {
    dimension: usize,
    cells: Vec<Option<Token>>,
    positions: HashMap<TokenId, Position>,
}

impl Grid {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            cells: vec![None; dimension * dimension],
            positions: HashMap::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Linear index of `pos`, or `None` for anything off the board. All cell
    /// access goes through here.
    pub fn index_of(&self, pos: Position) -> Option<usize> {
        if pos.x >= self.dimension || pos.y >= self.dimension {
            return None;
        }
        Some(pos.y * self.dimension + pos.x)
    }

    fn position_from_index(&self, index: usize) -> Position {
        Position::new(index % self.dimension, index / self.dimension)
    }

    pub fn get(&self, pos: Position) -> Option<Token> {
        let index = self.index_of(pos)?;
        self.cells[index]
    }

    pub fn position_of(&self, id: TokenId) -> Option<Position> {
        self.positions.get(&id).copied()
    }

    pub fn contains(&self, token: &Token) -> bool {
        self.position_of(token.id())
            .and_then(|pos| self.get(pos))
            .is_some_and(|held| held == *token)
    }

    /// Puts `token` (or nothing) at `pos` and returns whatever was evicted
    /// from that cell. A token already on the grid is detached from its old
    /// cell first. Off-board positions change nothing and return `None`.
    pub fn place(&mut self, pos: Position, token: Option<Token>) -> Option<Token> {
        let index = self.index_of(pos)?;

        if let Some(token) = token
            && let Some(old_pos) = self.positions.get(&token.id()).copied()
        {
            if old_pos == pos {
                return None;
            }
            if let Some(old_index) = self.index_of(old_pos) {
                self.cells[old_index] = None;
            }
        }

        let previous = self.cells[index].take();
        if let Some(previous) = previous {
            self.positions.remove(&previous.id());
        }

        if let Some(token) = token {
            self.positions.insert(token.id(), pos);
        }
        self.cells[index] = token;

        previous
    }

    /// Exchanges the contents of two cells in one step. Either cell may be
    /// empty. Returns false without touching anything if either is off-board.
    pub fn swap(&mut self, a: Position, b: Position) -> bool {
        let (Some(ia), Some(ib)) = (self.index_of(a), self.index_of(b)) else {
            return false;
        };
        if ia == ib {
            return true;
        }

        self.cells.swap(ia, ib);
        if let Some(token) = self.cells[ia] {
            self.positions.insert(token.id(), a);
        }
        if let Some(token) = self.cells[ib] {
            self.positions.insert(token.id(), b);
        }
        true
    }

    /// Destructive reset to an empty grid of the new size.
    pub fn resize(&mut self, dimension: usize) {
        self.dimension = dimension;
        self.cells = vec![None; dimension * dimension];
        self.positions.clear();
    }

    /// Removes every token, returning them row-major with their last cell.
    pub fn drain(&mut self) -> Vec<Placement> {
        let mut drained = Vec::with_capacity(self.positions.len());
        for index in 0..self.cells.len() {
            if let Some(token) = self.cells[index].take() {
                drained.push(Placement::new(self.position_from_index(index), token));
            }
        }
        self.positions.clear();
        drained
    }

    pub fn occupied(&self) -> impl Iterator<Item = Placement> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(i, cell)| {
                cell.map(|token| Placement::new(self.position_from_index(i), token))
            })
    }

    pub fn occupied_count(&self) -> usize {
        self.positions.len()
    }

    pub fn empty_positions(&self) -> Vec<Position> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_none())
            .map(|(i, _)| self.position_from_index(i))
            .collect()
    }

    pub fn cells(&self) -> &[Option<Token>] {
        &self.cells
    }

    /// Checks the bidirectional invariant. Used by tests after every
    /// operation.
    pub fn is_consistent(&self) -> bool {
        let forward = self.cells.iter().enumerate().all(|(i, cell)| match cell {
            Some(token) => {
                self.positions.get(&token.id()) == Some(&self.position_from_index(i))
            }
            None => true,
        });
        let backward = self
            .positions
            .iter()
            .all(|(id, pos)| self.get(*pos).is_some_and(|token| token.id() == *id));
        forward && backward && self.positions.len() == self.cells.iter().flatten().count()
    }
}
