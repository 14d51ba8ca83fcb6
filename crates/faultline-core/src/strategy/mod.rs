//! Search strategies: polymorphic generators of the next parameter point.

pub mod explore;
pub mod grid;
pub mod random;
pub mod region;
pub mod replay;

pub use explore::ExploreExploitStrategy;
pub use grid::GridStrategy;
pub use random::RandomStrategy;
pub use region::RegionAdaptiveStrategy;
pub use replay::ReplayStrategy;

use crate::attempt::Attempt;
use crate::classify::Outcome;
use crate::errors::ConfigError;
use crate::space::{ParameterPoint, SweepRange};

/// One point-picker. `next` is called once per trial; `observe` feeds the
/// classified outcome back after the trial completes. Stateless strategies
/// keep the default no-op `observe` rather than omitting it.
///
/// Seeded strategies must be deterministic for a fixed seed.
pub trait SearchStrategy: Send {
    fn name(&self) -> &'static str;

    /// The next point to try, or `None` once the strategy is exhausted
    /// (e.g. a grid lattice fully visited).
    fn next(&mut self, log: &[Attempt]) -> Option<ParameterPoint>;

    fn observe(&mut self, _point: ParameterPoint, _outcome: Outcome) {}
}

/// Strategy selector for config/CLI surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Grid,
    Random,
    RegionAdaptive,
    ExploreExploit,
}

impl StrategyKind {
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name {
            "grid" => Ok(Self::Grid),
            "random" => Ok(Self::Random),
            "region" | "adaptive" => Ok(Self::RegionAdaptive),
            "explore" | "explore-exploit" => Ok(Self::ExploreExploit),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }

    /// Build a boxed strategy over `range`, seeded for reproducibility.
    /// `budget` sizes the exploration warm-up; only ExploreExploit uses it.
    pub fn build(
        self,
        range: &SweepRange,
        seed: u64,
        budget: u32,
    ) -> Result<Box<dyn SearchStrategy>, ConfigError> {
        range.validate()?;
        Ok(match self {
            Self::Grid => Box::new(GridStrategy::new(*range)),
            Self::Random => Box::new(RandomStrategy::new(*range, seed)),
            Self::RegionAdaptive => Box::new(RegionAdaptiveStrategy::new(*range, seed)),
            Self::ExploreExploit => {
                Box::new(ExploreExploitStrategy::new(*range, seed, budget)?)
            }
        })
    }
}
