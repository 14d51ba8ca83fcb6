//! Outcome classification for captured target responses.

use crate::errors::ClassifierError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorical judgment of one trial's effect on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Desired effect observed (a success pattern matched).
    Success,
    /// Target crashed or reset.
    Crash,
    /// Output suppressed; often a partial success.
    Mute,
    /// No observable effect.
    Normal,
    /// No response, or the trial's I/O failed.
    Timeout,
}

impl Outcome {
    /// Anything that is not plain Normal/Timeout is worth revisiting.
    pub fn is_interesting(self) -> bool {
        matches!(self, Outcome::Success | Outcome::Crash | Outcome::Mute)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Success => "success",
            Outcome::Crash => "crash",
            Outcome::Mute => "mute",
            Outcome::Normal => "normal",
            Outcome::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// Crash indicators that show up on most embedded targets.
pub const DEFAULT_CRASH_PATTERNS: &[&str] = &[
    "reset",
    "reboot",
    "fault",
    "exception",
    "hard fault",
    "watchdog",
    "wdt",
];

/// Ordered, case-insensitive substring pattern lists per category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub success_patterns: Vec<String>,
    pub crash_patterns: Vec<String>,
    pub mute_patterns: Vec<String>,
}

impl ClassifierConfig {
    pub fn with_default_crash_patterns(mut self) -> Self {
        if self.crash_patterns.is_empty() {
            self.crash_patterns = DEFAULT_CRASH_PATTERNS
                .iter()
                .map(|s| (*s).to_string())
                .collect();
        }
        self
    }
}

/// Maps a raw response (or its absence) to an [`Outcome`].
///
/// Evaluation order is SUCCESS → CRASH → MUTE → NORMAL, first match wins.
/// A timeout or empty response short-circuits to Timeout before any
/// pattern matching.
#[derive(Debug, Clone)]
pub struct ResultClassifier {
    success: Vec<String>,
    crash: Vec<String>,
    mute: Vec<String>,
}

impl ResultClassifier {
    /// Build a classifier, validating every pattern up front. Blank patterns
    /// would match everything, so they are rejected here rather than letting
    /// them silently misclassify at trial time.
    pub fn new(config: ClassifierConfig) -> Result<Self, ClassifierError> {
        Ok(Self {
            success: Self::normalize("success", &config.success_patterns)?,
            crash: Self::normalize("crash", &config.crash_patterns)?,
            mute: Self::normalize("mute", &config.mute_patterns)?,
        })
    }

    fn normalize(
        category: &'static str,
        patterns: &[String],
    ) -> Result<Vec<String>, ClassifierError> {
        patterns
            .iter()
            .enumerate()
            .map(|(index, p)| {
                let trimmed = p.trim();
                if trimmed.is_empty() {
                    Err(ClassifierError::EmptyPattern { category, index })
                } else {
                    Ok(trimmed.to_lowercase())
                }
            })
            .collect()
    }

    pub fn classify(&self, response: Option<&[u8]>, timed_out: bool) -> Outcome {
        let Some(bytes) = response else {
            return Outcome::Timeout;
        };
        if timed_out || bytes.is_empty() {
            return Outcome::Timeout;
        }

        let text = String::from_utf8_lossy(bytes).to_lowercase();

        if self.success.iter().any(|p| text.contains(p.as_str())) {
            return Outcome::Success;
        }
        if self.crash.iter().any(|p| text.contains(p.as_str())) {
            return Outcome::Crash;
        }
        if self.mute.iter().any(|p| text.contains(p.as_str())) {
            return Outcome::Mute;
        }
        Outcome::Normal
    }

    pub fn classify_text(&self, response: &str, timed_out: bool) -> Outcome {
        self.classify(Some(response.as_bytes()), timed_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier(success: &[&str], crash: &[&str], mute: &[&str]) -> ResultClassifier {
        ResultClassifier::new(ClassifierConfig {
            success_patterns: success.iter().map(|s| (*s).to_string()).collect(),
            crash_patterns: crash.iter().map(|s| (*s).to_string()).collect(),
            mute_patterns: mute.iter().map(|s| (*s).to_string()).collect(),
        })
        .expect("valid patterns")
    }

    #[test]
    fn timeout_checked_before_patterns() {
        let c = classifier(&["flag{"], &["reset"], &[]);
        assert_eq!(c.classify(None, false), Outcome::Timeout);
        assert_eq!(c.classify(Some(b""), false), Outcome::Timeout);
        assert_eq!(c.classify(Some(b"flag{x}"), true), Outcome::Timeout);
    }

    #[test]
    fn crash_beats_normal_when_success_absent() {
        let c = classifier(&["flag{"], &["reset"], &[]);
        assert_eq!(c.classify(Some(b"reset detected"), false), Outcome::Crash);
    }

    #[test]
    fn success_wins_over_crash() {
        let c = classifier(&["flag{"], &["reset"], &[]);
        assert_eq!(
            c.classify(Some(b"reset then flag{loot}"), false),
            Outcome::Success
        );
    }

    #[test]
    fn matching_is_case_insensitive() {
        let c = classifier(&["Target Halted"], &[], &[]);
        assert_eq!(c.classify(Some(b"TARGET HALTED ok"), false), Outcome::Success);
    }

    #[test]
    fn invalid_utf8_degrades_to_normal() {
        let c = classifier(&["flag{"], &["reset"], &[]);
        assert_eq!(c.classify(Some(&[0xff, 0xfe, 0x41]), false), Outcome::Normal);
    }

    #[test]
    fn blank_pattern_rejected_at_construction() {
        let err = ResultClassifier::new(ClassifierConfig {
            success_patterns: vec!["  ".into()],
            ..Default::default()
        });
        assert!(err.is_err());
    }

    #[test]
    fn default_crash_patterns_cover_watchdog() {
        let c = ResultClassifier::new(
            ClassifierConfig::default().with_default_crash_patterns(),
        )
        .expect("defaults valid");
        assert_eq!(c.classify_text("WDT expired", false), Outcome::Crash);
    }
}
