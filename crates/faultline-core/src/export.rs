//! JSON persistence of a campaign: summary stats plus the full attempt log.
//!
//! The attempt log is the authoritative payload. Heatmaps and stats are
//! re-derived from it on import, so an exported file survives format growth
//! in the derived aggregates.

use crate::attempt::Attempt;
use crate::classify::Outcome;
use crate::space::ParameterPoint;
use crate::stats::CampaignStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedAttempt {
    pub width_ns: u64,
    pub offset_ns: u64,
    pub result: Outcome,
    pub timestamp: DateTime<Utc>,
    pub response: String,
    pub latency_ms: f64,
}

impl From<&Attempt> for ExportedAttempt {
    fn from(attempt: &Attempt) -> Self {
        Self {
            width_ns: attempt.point.width_ns,
            offset_ns: attempt.point.offset_ns,
            result: attempt.outcome,
            timestamp: attempt.timestamp,
            response: attempt.response_excerpt.clone(),
            latency_ms: attempt.latency_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDoc {
    pub stats: CampaignStats,
    pub attempts: Vec<ExportedAttempt>,
}

impl ExportDoc {
    pub fn from_campaign(stats: &CampaignStats, log: &[Attempt]) -> Self {
        Self {
            stats: stats.clone(),
            attempts: log.iter().map(ExportedAttempt::from).collect(),
        }
    }

    /// Reconstruct the attempt log. Iteration numbers are reassigned from
    /// the position in the file; the original in-run indices are not part
    /// of the wire format.
    pub fn to_attempts(&self) -> Vec<Attempt> {
        self.attempts
            .iter()
            .enumerate()
            .map(|(i, a)| Attempt {
                point: ParameterPoint::new(a.width_ns, a.offset_ns),
                outcome: a.result,
                timestamp: a.timestamp,
                response_excerpt: a.response.clone(),
                latency_ms: a.latency_ms,
                iteration: i as u32,
            })
            .collect()
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, self.to_json()?)?;
        tracing::info!(path = %path.display(), attempts = self.attempts.len(), "results exported");
        Ok(())
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let doc = Self::from_json(&json)?;
        tracing::info!(path = %path.display(), attempts = doc.attempts.len(), "results loaded");
        Ok(doc)
    }
}
