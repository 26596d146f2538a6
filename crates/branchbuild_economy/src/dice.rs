//! Seedable dice for `roll_dice` effects.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Newtype over `ChaCha20Rng` used for every die roll in a session.
#[derive(Clone, Debug)]
pub struct Dice(ChaCha20Rng);

impl Dice {
    /// Reproducible dice from an integer seed.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self(ChaCha20Rng::seed_from_u64(seed))
    }

    /// Dice seeded from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self(ChaCha20Rng::from_entropy())
    }

    /// Dice for an optional seed.
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::seeded)
    }

    /// Draws an integer in `[min, max]`; swapped bounds are reordered.
    pub fn roll(&mut self, min: i64, max: i64) -> i64 {
        let (low, high) = if min <= max { (min, max) } else { (max, min) };
        self.0.gen_range(low..=high)
    }
}
