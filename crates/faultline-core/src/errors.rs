use thiserror::Error;

/// Fatal configuration problems, raised at `run()` entry before any trial.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("empty parameter range: {0}")]
    EmptyRange(String),
    #[error("step must be non-zero on {0} axis")]
    ZeroStep(String),
    #[error("max_attempts must be non-zero")]
    ZeroBudget,
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),
    #[error("profile not found: {0}")]
    UnknownProfile(String),
    #[error("unknown attack target: {0}")]
    UnknownTarget(String),
    #[error("exploration rate must be within [0, 1], got {0}")]
    BadExplorationRate(f64),
}

/// Pattern problems surface when the classifier is built, never at
/// classification time.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("empty {category} pattern at index {index}")]
    EmptyPattern {
        category: &'static str,
        index: usize,
    },
}
