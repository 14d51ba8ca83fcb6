//! Outcome heatmap on the quantized (width_step, offset_step) lattice.
//!
//! Visualization and selection heuristics only; correctness always derives
//! from the attempt log.

use crate::attempt::Attempt;
use crate::classify::Outcome;
use crate::space::ParameterPoint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Derived per-cell summary handed to visualization callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapCell {
    pub width_ns: u64,
    pub offset_ns: u64,
    /// Mean interest score over the cell's attempts
    /// (success 1.0, mute 0.5, crash 0.3, else 0).
    pub score: f64,
    pub attempts: u32,
    pub successes: u32,
    pub crashes: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap {
    width_step: u64,
    offset_step: u64,
    cells: BTreeMap<(u64, u64), Vec<Outcome>>,
}

impl Heatmap {
    pub fn new(width_step: u64, offset_step: u64) -> Self {
        Self {
            width_step: width_step.max(1),
            offset_step: offset_step.max(1),
            cells: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, point: ParameterPoint, outcome: Outcome) {
        let key = point.quantized(self.width_step, self.offset_step);
        self.cells.entry(key).or_default().push(outcome);
    }

    /// Rebuild from scratch out of an attempt log (import/resume path).
    pub fn from_log(width_step: u64, offset_step: u64, log: &[Attempt]) -> Self {
        let mut map = Self::new(width_step, offset_step);
        for attempt in log {
            map.record(attempt.point, attempt.outcome);
        }
        map
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    fn outcome_weight(outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Success => 1.0,
            Outcome::Mute => 0.5,
            Outcome::Crash => 0.3,
            Outcome::Normal | Outcome::Timeout => 0.0,
        }
    }

    /// Per-cell summaries in deterministic (width, offset) order.
    pub fn cells(&self) -> Vec<HeatmapCell> {
        self.cells
            .iter()
            .map(|(&(width_ns, offset_ns), outcomes)| {
                let total: f64 = outcomes.iter().map(|&o| Self::outcome_weight(o)).sum();
                HeatmapCell {
                    width_ns,
                    offset_ns,
                    score: total / outcomes.len() as f64,
                    attempts: outcomes.len() as u32,
                    successes: outcomes.iter().filter(|&&o| o == Outcome::Success).count()
                        as u32,
                    crashes: outcomes.iter().filter(|&&o| o == Outcome::Crash).count() as u32,
                }
            })
            .collect()
    }

    /// Quantized cells that ever produced an interesting outcome.
    pub fn interesting_cells(&self) -> Vec<ParameterPoint> {
        self.cells
            .iter()
            .filter(|(_, outcomes)| outcomes.iter().any(|o| o.is_interesting()))
            .map(|(&(w, o), _)| ParameterPoint::new(w, o))
            .collect()
    }
}
