//! The append-only attempt log: single source of truth for every derived
//! aggregate (stats, heatmap, success list).

use crate::classify::Outcome;
use crate::phased::Phase;
use crate::space::ParameterPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record of one trial. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub point: ParameterPoint,
    pub outcome: Outcome,
    pub timestamp: DateTime<Utc>,
    /// First bytes of the decoded response, or the error text for a trial
    /// that failed in hardware I/O.
    pub response_excerpt: String,
    pub latency_ms: f64,
    /// Monotonic issuance index within one campaign run.
    pub iteration: u32,
}

/// Successful attempts kept separately for phase seeding and reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessRecord {
    pub point: ParameterPoint,
    pub phase: Option<Phase>,
    pub raw_output: String,
}

/// Distinct success points, in first-seen order.
pub fn distinct_success_points(successes: &[SuccessRecord]) -> Vec<ParameterPoint> {
    let mut seen = Vec::new();
    for s in successes {
        if !seen.contains(&s.point) {
            seen.push(s.point);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_points_preserve_first_seen_order() {
        let p1 = ParameterPoint::new(100, 3000);
        let p2 = ParameterPoint::new(120, 3500);
        let successes = vec![
            SuccessRecord {
                point: p1,
                phase: None,
                raw_output: String::new(),
            },
            SuccessRecord {
                point: p2,
                phase: None,
                raw_output: String::new(),
            },
            SuccessRecord {
                point: p1,
                phase: None,
                raw_output: String::new(),
            },
        ];
        assert_eq!(distinct_success_points(&successes), vec![p1, p2]);
    }
}
