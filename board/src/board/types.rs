use std::fmt;
use std::str::FromStr;

use super::error::BoardError;

pub const DEFAULT_DIMENSION: usize = 8;
pub const MIN_DIMENSION: usize = 3;
pub const MAX_DIMENSION: usize = 32;
pub const DEFAULT_PALETTE_SIZE: u8 = 4;
pub const MIN_PALETTE_SIZE: u8 = 2;
pub const MAX_PALETTE_SIZE: u8 = 16;

/// Shortest run that counts as a match.
pub const MIN_RUN: usize = 3;

/// Candidates drawn per empty cell before the refiller gives up on avoiding
/// an immediate match and keeps the last one.
pub const MAX_FILL_ATTEMPTS: usize = 4;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct Color(u8);

impl Color {
    pub fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn symbol(self) -> char {
        (b'A' + self.0 % 26) as char
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct TokenId(u64);

impl TokenId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A colored piece. Tokens are plain values: the grid decides where a token
/// lives, the token itself only carries identity and color.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Token {
    id: TokenId,
    color: Color,
}

impl Token {
    pub(crate) fn new(id: TokenId, color: Color) -> Self {
        Self { id, color }
    }

    pub fn id(&self) -> TokenId {
        self.id
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// The match relation: two tokens are interchangeable for runs iff their
    /// colors agree, regardless of identity.
    pub fn same_color(&self, other: &Token) -> bool {
        self.color == other.color
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.color.symbol(), self.id)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Neighbouring cell in `direction`, or `None` if it falls off a board of
    /// the given dimension.
    pub fn step(self, direction: Direction, dimension: usize) -> Option<Position> {
        let (dx, dy) = direction.offset();
        let x = self.x.checked_add_signed(dx)?;
        let y = self.y.checked_add_signed(dy)?;
        if x >= dimension || y >= dimension {
            return None;
        }
        Some(Position::new(x, y))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Unit offset in grid coordinates; y grows downwards.
    pub fn offset(self) -> (isize, isize) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl FromStr for Direction {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            _ => Err(BoardError::InvalidDirection(s.to_string())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A token together with the cell it occupied when an event was recorded.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Placement {
    pub position: Position,
    pub token: Token,
}

impl Placement {
    pub fn new(position: Position, token: Token) -> Self {
        Self { position, token }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BoardEvent {
    Moved {
        token: Token,
        from: Position,
        to: Position,
    },
    Swapped {
        first: Placement,
        second: Placement,
    },
    Removed {
        tokens: Vec<Placement>,
    },
    Refilled {
        tokens: Vec<Placement>,
    },
    Cleared {
        tokens: Vec<Placement>,
    },
}
