mod cascade;
mod error;
mod grid;
mod matcher;
mod refill;
mod settle;
mod snapshot;
pub(crate) mod types;

pub use cascade::{CycleHandle, GemBoard};
pub use error::BoardError;
pub use grid::Grid;
pub use matcher::{find_matches, would_match};
pub use refill::fill;
pub use settle::{FixedDelay, Immediate, Settle};
pub use snapshot::BoardSnapshot;
pub use types::{
    BoardEvent, Color, Direction, Placement, Position, Token, TokenId, DEFAULT_DIMENSION,
    DEFAULT_PALETTE_SIZE, MAX_FILL_ATTEMPTS, MIN_RUN,
};
