//! Quad-tree adaptive search.
//!
//! Keeps a worklist of regions that always partitions the original search
//! rectangle. Sampling density drifts toward regions that produced any
//! anomalous outcome, while an ε term on selection keeps cold regions from
//! starving entirely.

use super::SearchStrategy;
use crate::attempt::Attempt;
use crate::classify::Outcome;
use crate::space::{ParameterPoint, ParameterRegion, SweepRange};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SUBDIVIDE_MIN_ATTEMPTS: u32 = 5;
const SUBDIVIDE_MIN_SCORE: f64 = 0.5;
const SELECTION_EPSILON: f64 = 0.1;

#[derive(Debug)]
pub struct RegionAdaptiveStrategy {
    regions: Vec<ParameterRegion>,
    rng: StdRng,
}

impl RegionAdaptiveStrategy {
    pub fn new(range: SweepRange, seed: u64) -> Self {
        Self {
            regions: vec![ParameterRegion::spanning(&range)],
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn regions(&self) -> &[ParameterRegion] {
        &self.regions
    }

    /// Index of the region with the highest `score + ε·uniform(0,1)`.
    fn select_region(&mut self) -> usize {
        let mut best = 0;
        let mut best_key = f64::NEG_INFINITY;
        for (i, region) in self.regions.iter().enumerate() {
            let key = region.score + self.rng.gen::<f64>() * SELECTION_EPSILON;
            if key > best_key {
                best_key = key;
                best = i;
            }
        }
        best
    }

    fn score_delta(outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Success => 1.0,
            Outcome::Mute => 0.5,
            Outcome::Crash => 0.3,
            Outcome::Normal | Outcome::Timeout => 0.0,
        }
    }
}

impl SearchStrategy for RegionAdaptiveStrategy {
    fn name(&self) -> &'static str {
        "region-adaptive"
    }

    fn next(&mut self, _log: &[Attempt]) -> Option<ParameterPoint> {
        if self.regions.is_empty() {
            return None;
        }
        let idx = self.select_region();
        let region = &self.regions[idx];
        Some(ParameterPoint::new(
            self.rng.gen_range(region.min.width_ns..=region.max.width_ns),
            self.rng
                .gen_range(region.min.offset_ns..=region.max.offset_ns),
        ))
    }

    fn observe(&mut self, point: ParameterPoint, outcome: Outcome) {
        let Some(idx) = self.regions.iter().position(|r| r.contains(point)) else {
            return;
        };
        {
            let region = &mut self.regions[idx];
            region.attempts += 1;
            if outcome == Outcome::Success {
                region.successes += 1;
            }
            region.score += Self::score_delta(outcome);
        }

        let region = self.regions[idx];
        if region.attempts >= SUBDIVIDE_MIN_ATTEMPTS && region.score > SUBDIVIDE_MIN_SCORE {
            if let Some(children) = region.subdivide() {
                // Children start with zeroed scores so they must earn
                // their own sampling priority.
                self.regions.swap_remove(idx);
                self.regions.extend_from_slice(&children);
            }
        }
    }
}
