//! ε-greedy exploration/exploitation over observed interesting points.

use super::SearchStrategy;
use crate::attempt::Attempt;
use crate::classify::Outcome;
use crate::errors::ConfigError;
use crate::space::{ParameterPoint, SweepRange};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

pub const DEFAULT_EXPLORATION_RATE: f64 = 0.3;

/// Jitter σ as a multiple of the configured step. The multiplier is a
/// tunable default, not a load-bearing constant.
pub const DEFAULT_SIGMA_SCALE: f64 = 2.0;

const WARMUP_CAP: u32 = 100;

/// With probability `exploration_rate` samples uniformly; otherwise picks a
/// previously interesting point (SUCCESS/CRASH/MUTE) and perturbs it with
/// Gaussian noise clamped to the bounds. An unconditional random warm-up
/// (~10% of the budget, capped at 100) runs first so exploitation never
/// operates on an empty interesting-set.
#[derive(Debug)]
pub struct ExploreExploitStrategy {
    range: SweepRange,
    rng: StdRng,
    exploration_rate: f64,
    width_jitter: Normal<f64>,
    offset_jitter: Normal<f64>,
    warmup_remaining: u32,
    interesting: Vec<ParameterPoint>,
}

impl ExploreExploitStrategy {
    pub fn new(range: SweepRange, seed: u64, budget: u32) -> Result<Self, ConfigError> {
        Self::with_tuning(range, seed, budget, DEFAULT_EXPLORATION_RATE, DEFAULT_SIGMA_SCALE)
    }

    pub fn with_tuning(
        range: SweepRange,
        seed: u64,
        budget: u32,
        exploration_rate: f64,
        sigma_scale: f64,
    ) -> Result<Self, ConfigError> {
        range.validate()?;
        if !(0.0..=1.0).contains(&exploration_rate) {
            return Err(ConfigError::BadExplorationRate(exploration_rate));
        }
        let sigma = |step: u64| (step.max(1) as f64 * sigma_scale).max(f64::MIN_POSITIVE);
        let width_jitter = Normal::new(0.0, sigma(range.width.step))
            .map_err(|_| ConfigError::BadExplorationRate(sigma_scale))?;
        let offset_jitter = Normal::new(0.0, sigma(range.offset.step))
            .map_err(|_| ConfigError::BadExplorationRate(sigma_scale))?;
        Ok(Self {
            range,
            rng: StdRng::seed_from_u64(seed),
            exploration_rate,
            width_jitter,
            offset_jitter,
            warmup_remaining: (budget / 10).min(WARMUP_CAP),
            interesting: Vec::new(),
        })
    }

    fn uniform(&mut self) -> ParameterPoint {
        ParameterPoint::new(
            self.rng.gen_range(self.range.width.min..=self.range.width.max),
            self.rng
                .gen_range(self.range.offset.min..=self.range.offset.max),
        )
    }

    fn perturb(&mut self, base: ParameterPoint) -> ParameterPoint {
        let jitter = |value: u64, sample: f64| {
            let moved = value as f64 + sample;
            if moved <= 0.0 {
                0
            } else {
                moved.round() as u64
            }
        };
        let w = self.width_jitter.sample(&mut self.rng);
        let o = self.offset_jitter.sample(&mut self.rng);
        self.range.clamp(ParameterPoint::new(
            jitter(base.width_ns, w),
            jitter(base.offset_ns, o),
        ))
    }
}

impl SearchStrategy for ExploreExploitStrategy {
    fn name(&self) -> &'static str {
        "explore-exploit"
    }

    fn next(&mut self, _log: &[Attempt]) -> Option<ParameterPoint> {
        if self.warmup_remaining > 0 {
            self.warmup_remaining -= 1;
            return Some(self.uniform());
        }
        if self.interesting.is_empty() || self.rng.gen::<f64>() < self.exploration_rate {
            return Some(self.uniform());
        }
        match self.interesting.choose(&mut self.rng).copied() {
            Some(base) => Some(self.perturb(base)),
            None => Some(self.uniform()),
        }
    }

    fn observe(&mut self, point: ParameterPoint, outcome: Outcome) {
        if outcome.is_interesting() && !self.interesting.contains(&point) {
            self.interesting.push(point);
        }
    }
}
