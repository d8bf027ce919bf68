use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::Validate;
use crate::board::types::{
    DEFAULT_DIMENSION, DEFAULT_PALETTE_SIZE, MAX_DIMENSION, MAX_PALETTE_SIZE, MIN_DIMENSION,
    MIN_PALETTE_SIZE,
};
use crate::board::FixedDelay;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub dimension: usize,
    pub palette_size: u8,
    pub removal_delay_ms: u64,
    pub refill_delay_ms: u64,
    /// Fixed seed for reproducible boards; a random one is drawn when absent.
    pub seed: Option<u64>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
            palette_size: DEFAULT_PALETTE_SIZE,
            removal_delay_ms: 0,
            refill_delay_ms: 0,
            seed: None,
        }
    }
}

impl BoardConfig {
    pub fn settle(&self) -> FixedDelay {
        FixedDelay::new(
            Duration::from_millis(self.removal_delay_ms),
            Duration::from_millis(self.refill_delay_ms),
        )
    }
}

impl Validate for BoardConfig {
    fn validate(&self) -> Result<(), String> {
        if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&self.dimension) {
            return Err(format!(
                "Dimension must be between {} and {}, got {}",
                MIN_DIMENSION, MAX_DIMENSION, self.dimension
            ));
        }
        if !(MIN_PALETTE_SIZE..=MAX_PALETTE_SIZE).contains(&self.palette_size) {
            return Err(format!(
                "Palette size must be between {} and {}, got {}",
                MIN_PALETTE_SIZE, MAX_PALETTE_SIZE, self.palette_size
            ));
        }
        Ok(())
    }
}
