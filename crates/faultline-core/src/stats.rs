//! Campaign aggregates. Maintained incrementally during a run, but always
//! recomputable from the attempt log alone.

use crate::attempt::Attempt;
use crate::classify::Outcome;
use crate::space::ParameterPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignStats {
    pub total_attempts: u32,
    pub successes: u32,
    pub crashes: u32,
    pub mutes: u32,
    pub normals: u32,
    pub timeouts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Point of the most recent SUCCESS, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_point: Option<ParameterPoint>,
}

impl CampaignStats {
    pub fn begin() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn record(&mut self, attempt: &Attempt) {
        self.total_attempts += 1;
        match attempt.outcome {
            Outcome::Success => {
                self.successes += 1;
                self.best_point = Some(attempt.point);
            }
            Outcome::Crash => self.crashes += 1,
            Outcome::Mute => self.mutes += 1,
            Outcome::Normal => self.normals += 1,
            Outcome::Timeout => self.timeouts += 1,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Pure re-derivation from the log. Timing fields are taken from the
    /// first and last attempt timestamps.
    pub fn from_log(log: &[Attempt]) -> Self {
        let mut stats = Self {
            started_at: log.first().map(|a| a.timestamp),
            finished_at: log.last().map(|a| a.timestamp),
            ..Default::default()
        };
        for attempt in log {
            stats.record(attempt);
        }
        stats
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            f64::from(self.successes) / f64::from(self.total_attempts)
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => (end - start).num_milliseconds() as f64 / 1000.0,
            (Some(start), None) => (Utc::now() - start).num_milliseconds() as f64 / 1000.0,
            _ => 0.0,
        }
    }

    /// Counter-field equality, ignoring wall-clock fields. Used by the
    /// log-consistency checks.
    pub fn counts_match(&self, other: &Self) -> bool {
        self.total_attempts == other.total_attempts
            && self.successes == other.successes
            && self.crashes == other.crashes
            && self.mutes == other.mutes
            && self.normals == other.normals
            && self.timeouts == other.timeouts
            && self.best_point == other.best_point
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(outcome: Outcome, width: u64, iteration: u32) -> Attempt {
        Attempt {
            point: ParameterPoint::new(width, 1000),
            outcome,
            timestamp: Utc::now(),
            response_excerpt: String::new(),
            latency_ms: 1.0,
            iteration,
        }
    }

    #[test]
    fn incremental_and_rederived_stats_agree() {
        let log = vec![
            attempt(Outcome::Normal, 50, 0),
            attempt(Outcome::Crash, 60, 1),
            attempt(Outcome::Success, 70, 2),
            attempt(Outcome::Timeout, 80, 3),
            attempt(Outcome::Success, 90, 4),
            attempt(Outcome::Mute, 95, 5),
        ];

        let mut incremental = CampaignStats::begin();
        for a in &log {
            incremental.record(a);
        }
        incremental.finish();

        let derived = CampaignStats::from_log(&log);
        assert!(incremental.counts_match(&derived));
        // Best point tracks the most recent success, not the first.
        assert_eq!(derived.best_point, Some(ParameterPoint::new(90, 1000)));
    }

    #[test]
    fn empty_log_yields_zeroed_stats() {
        let derived = CampaignStats::from_log(&[]);
        assert_eq!(derived.total_attempts, 0);
        assert_eq!(derived.best_point, None);
        assert_eq!(derived.success_rate(), 0.0);
    }
}
