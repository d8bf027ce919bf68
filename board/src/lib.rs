pub mod board;
pub mod config;
pub mod id_generator;
pub mod logger;
pub mod session_rng;

pub use board::{
    BoardError, BoardEvent, BoardSnapshot, Color, CycleHandle, Direction, FixedDelay, GemBoard,
    Grid, Immediate, Placement, Position, Settle, Token, TokenId,
};
pub use config::BoardConfig;
pub use session_rng::SessionRng;
