use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::board::Color;

/// Seeded random source owned by one board. Every color a board ever
/// generates comes from here, so a fixed seed replays the same game.
pub struct SessionRng {
    rng: StdRng,
    seed: u64,
}

impl SessionRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    pub fn from_random() -> Self {
        let seed: u64 = rand::rng().random();
        Self::new(seed)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn random_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distr::uniform::SampleUniform,
        R: rand::distr::uniform::SampleRange<T>,
    {
        self.rng.random_range(range)
    }

    /// Uniform draw over `0..palette_size`.
    pub fn random_color(&mut self, palette_size: u8) -> Color {
        Color::new(self.rng.random_range(0..palette_size))
    }
}
