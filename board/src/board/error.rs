use std::error::Error;
use std::fmt;

use super::types::TokenId;

/// Contract violations by a caller. Ordinary game-logic refusals (off-board
/// moves, busy board) are never reported through this type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BoardError {
    InvalidColor { color: u8, palette_size: u8 },
    InvalidPaletteSize(u8),
    InvalidDimension(usize),
    InvalidDirection(String),
    UnknownToken(TokenId),
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardError::InvalidColor {
                color,
                palette_size,
            } => write!(
                f,
                "Color {} is outside the palette of {} colors",
                color, palette_size
            ),
            BoardError::InvalidPaletteSize(size) => {
                write!(f, "Palette of {} colors is not supported", size)
            }
            BoardError::InvalidDimension(dimension) => {
                write!(f, "Board dimension {} is not supported", dimension)
            }
            BoardError::InvalidDirection(direction) => {
                write!(f, "Unknown direction '{}'", direction)
            }
            BoardError::UnknownToken(id) => {
                write!(f, "Token {} was not created by this board", id)
            }
        }
    }
}

impl Error for BoardError {}
