//! Exhaustive lattice enumeration, the baseline strategy.

use super::SearchStrategy;
use crate::attempt::Attempt;
use crate::space::{ParameterPoint, SweepRange};

/// Row-major walk over the (width, offset) lattice: width is the outer
/// axis, offset the inner one. Each lattice point can be emitted `repeats`
/// times before moving on, which is how per-setting repeat counts are
/// expressed. Terminal once the lattice is exhausted.
#[derive(Debug, Clone)]
pub struct GridStrategy {
    range: SweepRange,
    repeats: u32,
    width: u64,
    offset: u64,
    emitted_at_point: u32,
    done: bool,
}

impl GridStrategy {
    pub fn new(range: SweepRange) -> Self {
        Self::with_repeats(range, 1)
    }

    pub fn with_repeats(range: SweepRange, repeats: u32) -> Self {
        Self {
            range,
            repeats: repeats.max(1),
            width: range.width.min,
            offset: range.offset.min,
            emitted_at_point: 0,
            done: false,
        }
    }

    /// Fine-tune grid: a window of ±`radius_ns` around `center` at
    /// `step_ns`, clamped below at zero.
    pub fn around(center: ParameterPoint, radius_ns: u64, step_ns: u64, repeats: u32) -> Self {
        Self::with_repeats(SweepRange::around(center, radius_ns, step_ns), repeats)
    }

    fn advance(&mut self) {
        if self.offset + self.range.offset.step <= self.range.offset.max {
            self.offset += self.range.offset.step;
        } else if self.width + self.range.width.step <= self.range.width.max {
            self.offset = self.range.offset.min;
            self.width += self.range.width.step;
        } else {
            self.done = true;
        }
    }
}

impl SearchStrategy for GridStrategy {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn next(&mut self, _log: &[Attempt]) -> Option<ParameterPoint> {
        if self.done {
            return None;
        }
        let point = ParameterPoint::new(self.width, self.offset);
        self.emitted_at_point += 1;
        if self.emitted_at_point >= self.repeats {
            self.emitted_at_point = 0;
            self.advance();
        }
        Some(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::AxisRange;

    fn drain(mut strategy: GridStrategy) -> Vec<(u64, u64)> {
        let mut out = Vec::new();
        while let Some(p) = strategy.next(&[]) {
            out.push((p.width_ns, p.offset_ns));
            assert!(out.len() < 10_000, "grid failed to terminate");
        }
        out
    }

    #[test]
    fn row_major_order_with_inclusive_endpoints() {
        let strategy = GridStrategy::new(SweepRange::new(
            AxisRange::new(50, 150, 50),
            AxisRange::new(0, 100, 100),
        ));
        assert_eq!(
            drain(strategy),
            vec![(50, 0), (50, 100), (100, 0), (100, 100), (150, 0), (150, 100)]
        );
    }

    #[test]
    fn repeats_emit_each_point_n_times() {
        let strategy = GridStrategy::with_repeats(
            SweepRange::new(AxisRange::new(10, 20, 10), AxisRange::new(0, 0, 1)),
            3,
        );
        assert_eq!(
            drain(strategy),
            vec![(10, 0), (10, 0), (10, 0), (20, 0), (20, 0), (20, 0)]
        );
    }

    #[test]
    fn single_point_range_emits_once() {
        let strategy = GridStrategy::new(SweepRange::new(
            AxisRange::new(5, 5, 1),
            AxisRange::new(7, 7, 1),
        ));
        assert_eq!(drain(strategy), vec![(5, 7)]);
    }

    #[test]
    fn around_window_clamps_below_zero() {
        let strategy = GridStrategy::around(ParameterPoint::new(20, 10), 50, 25, 1);
        let points = drain(strategy);
        assert!(points.iter().all(|&(w, o)| w <= 70 && o <= 60));
        assert!(points.contains(&(0, 0)));
    }
}
