//! Uniform random sampling over the configured bounds.

use super::SearchStrategy;
use crate::attempt::Attempt;
use crate::space::{ParameterPoint, SweepRange};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Never terminates on its own; the campaign's attempt budget bounds it.
#[derive(Debug)]
pub struct RandomStrategy {
    range: SweepRange,
    rng: StdRng,
}

impl RandomStrategy {
    pub fn new(range: SweepRange, seed: u64) -> Self {
        Self {
            range,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl SearchStrategy for RandomStrategy {
    fn name(&self) -> &'static str {
        "random"
    }

    fn next(&mut self, _log: &[Attempt]) -> Option<ParameterPoint> {
        Some(ParameterPoint::new(
            self.rng.gen_range(self.range.width.min..=self.range.width.max),
            self.rng
                .gen_range(self.range.offset.min..=self.range.offset.max),
        ))
    }
}
