//! Parameter space primitives: points, sweep ranges, and adaptive regions.
//!
//! All timing values are nanoseconds. Ranges are inclusive on both ends,
//! matching how glitcher hardware is usually specified (a width range of
//! 50..=150 with step 50 visits 50, 100 and 150).

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};

/// One candidate setting: glitch pulse width and trigger-to-pulse offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterPoint {
    pub width_ns: u64,
    pub offset_ns: u64,
}

impl ParameterPoint {
    pub fn new(width_ns: u64, offset_ns: u64) -> Self {
        Self {
            width_ns,
            offset_ns,
        }
    }

    /// Apply a signed calibration adjustment to the offset, saturating at zero.
    pub fn with_offset_adjust(self, adjust_ns: i64) -> Self {
        let offset_ns = if adjust_ns >= 0 {
            self.offset_ns.saturating_add(adjust_ns as u64)
        } else {
            self.offset_ns.saturating_sub(adjust_ns.unsigned_abs())
        };
        Self {
            width_ns: self.width_ns,
            offset_ns,
        }
    }

    /// Quantize to the heatmap lattice.
    pub fn quantized(self, width_step: u64, offset_step: u64) -> (u64, u64) {
        let ws = width_step.max(1);
        let os = offset_step.max(1);
        ((self.width_ns / ws) * ws, (self.offset_ns / os) * os)
    }
}

/// Inclusive range with a step on one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: u64,
    pub max: u64,
    pub step: u64,
}

impl AxisRange {
    pub fn new(min: u64, max: u64, step: u64) -> Self {
        Self { min, max, step }
    }

    pub fn validate(&self, axis: &str) -> Result<(), ConfigError> {
        if self.min > self.max {
            return Err(ConfigError::EmptyRange(format!(
                "{axis}: min {} > max {}",
                self.min, self.max
            )));
        }
        if self.step == 0 {
            return Err(ConfigError::ZeroStep(axis.to_string()));
        }
        Ok(())
    }

    /// Number of lattice points on this axis.
    pub fn lattice_len(&self) -> u64 {
        (self.max - self.min) / self.step + 1
    }

    pub fn clamp(&self, value: u64) -> u64 {
        value.clamp(self.min, self.max)
    }
}

/// A full two-axis search range with lattice steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepRange {
    pub width: AxisRange,
    pub offset: AxisRange,
}

impl SweepRange {
    pub fn new(width: AxisRange, offset: AxisRange) -> Self {
        Self { width, offset }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.width.validate("width")?;
        self.offset.validate("offset")?;
        Ok(())
    }

    pub fn lattice_len(&self) -> u64 {
        self.width.lattice_len() * self.offset.lattice_len()
    }

    pub fn contains(&self, point: ParameterPoint) -> bool {
        self.width.min <= point.width_ns
            && point.width_ns <= self.width.max
            && self.offset.min <= point.offset_ns
            && point.offset_ns <= self.offset.max
    }

    pub fn clamp(&self, point: ParameterPoint) -> ParameterPoint {
        ParameterPoint {
            width_ns: self.width.clamp(point.width_ns),
            offset_ns: self.offset.clamp(point.offset_ns),
        }
    }

    /// A centered window around `point`, clamped below at zero, at the given
    /// step on both axes. Used for fine-tuning around a success.
    pub fn around(point: ParameterPoint, radius_ns: u64, step_ns: u64) -> Self {
        Self {
            width: AxisRange::new(
                point.width_ns.saturating_sub(radius_ns),
                point.width_ns + radius_ns,
                step_ns,
            ),
            offset: AxisRange::new(
                point.offset_ns.saturating_sub(radius_ns),
                point.offset_ns + radius_ns,
                step_ns,
            ),
        }
    }
}

/// A rectangular sub-range of the search space with its own trial record.
///
/// The live set of regions held by the adaptive strategy is always a
/// partition of the original search rectangle: `subdivide` replaces one
/// region with four children whose inclusive bounds exactly tile it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterRegion {
    pub min: ParameterPoint,
    pub max: ParameterPoint,
    pub score: f64,
    pub attempts: u32,
    pub successes: u32,
}

impl ParameterRegion {
    pub fn spanning(range: &SweepRange) -> Self {
        Self::new(
            ParameterPoint::new(range.width.min, range.offset.min),
            ParameterPoint::new(range.width.max, range.offset.max),
        )
    }

    pub fn new(min: ParameterPoint, max: ParameterPoint) -> Self {
        Self {
            min,
            max,
            score: 0.0,
            attempts: 0,
            successes: 0,
        }
    }

    pub fn contains(&self, point: ParameterPoint) -> bool {
        self.min.width_ns <= point.width_ns
            && point.width_ns <= self.max.width_ns
            && self.min.offset_ns <= point.offset_ns
            && point.offset_ns <= self.max.offset_ns
    }

    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            f64::from(self.successes) / f64::from(self.attempts)
        }
    }

    /// Both axes must span at least two integers for the quad split to
    /// produce non-degenerate children.
    pub fn can_subdivide(&self) -> bool {
        self.max.width_ns > self.min.width_ns && self.max.offset_ns > self.min.offset_ns
    }

    /// Split into four quadrants. Children tile the parent exactly: the lower
    /// half ends at the midpoint, the upper half starts one past it. Scores
    /// and counters are not inherited.
    pub fn subdivide(&self) -> Option<[ParameterRegion; 4]> {
        if !self.can_subdivide() {
            return None;
        }
        let wm = (self.min.width_ns + self.max.width_ns) / 2;
        let om = (self.min.offset_ns + self.max.offset_ns) / 2;
        let p = ParameterPoint::new;
        Some([
            ParameterRegion::new(p(self.min.width_ns, self.min.offset_ns), p(wm, om)),
            ParameterRegion::new(p(wm + 1, self.min.offset_ns), p(self.max.width_ns, om)),
            ParameterRegion::new(p(self.min.width_ns, om + 1), p(wm, self.max.offset_ns)),
            ParameterRegion::new(p(wm + 1, om + 1), p(self.max.width_ns, self.max.offset_ns)),
        ])
    }

    pub fn area(&self) -> u128 {
        u128::from(self.max.width_ns - self.min.width_ns + 1)
            * u128::from(self.max.offset_ns - self.min.offset_ns + 1)
    }
}
