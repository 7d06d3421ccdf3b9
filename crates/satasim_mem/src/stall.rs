//! Random bus stalls.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Decides, per strobe, whether the target stalls.
#[derive(Debug, Clone)]
pub struct StallSource {
    rng: StdRng,
    one_in: u32,
}

impl StallSource {
    /// Stalls with probability `1 / one_in`; zero never stalls. A seed makes
    /// the sequence reproducible.
    pub fn new(one_in: u32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng, one_in }
    }

    /// Draws the stall decision for one strobe.
    pub fn sample(&mut self) -> bool {
        self.one_in != 0 && self.rng.gen_range(0..self.one_in) == 0
    }
}
