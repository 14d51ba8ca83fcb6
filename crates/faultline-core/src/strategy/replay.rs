//! Replay of a documented known-good point.
//!
//! Documented parameters were measured on a different, possibly
//! un-calibrated setup, so phase one of the adaptive workflow replays each
//! one a fixed number of times to assess reproducibility here.

use super::SearchStrategy;
use crate::attempt::Attempt;
use crate::space::ParameterPoint;

#[derive(Debug, Clone)]
pub struct ReplayStrategy {
    point: ParameterPoint,
    remaining: u32,
}

impl ReplayStrategy {
    pub fn new(point: ParameterPoint, repeats: u32) -> Self {
        Self {
            point,
            remaining: repeats,
        }
    }
}

impl SearchStrategy for ReplayStrategy {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn next(&mut self, _log: &[Attempt]) -> Option<ParameterPoint> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_the_fixed_point_exactly_n_times() {
        let point = ParameterPoint::new(120, 3500);
        let mut strategy = ReplayStrategy::new(point, 3);
        assert_eq!(strategy.next(&[]), Some(point));
        assert_eq!(strategy.next(&[]), Some(point));
        assert_eq!(strategy.next(&[]), Some(point));
        assert_eq!(strategy.next(&[]), None);
    }
}
