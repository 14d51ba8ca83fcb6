//! Fault-injection parameter search engine.
//!
//! Drives voltage/clock glitch campaigns over the (pulse width, trigger
//! offset) parameter space: pluggable search strategies, response
//! classification, a profile knowledge base, and a phased profile-guided
//! workflow. Hardware is abstracted behind two small async traits so the
//! engine runs identically against real glitchers and the built-in
//! simulated target.

pub mod attempt;
pub mod campaign;
pub mod classify;
pub mod errors;
pub mod export;
pub mod heatmap;
pub mod hw;
pub mod monitor;
pub mod phased;
pub mod profile;
pub mod sim;
pub mod space;
pub mod stats;
pub mod strategy;

pub use attempt::{Attempt, SuccessRecord};
pub use campaign::{Campaign, CampaignConfig, CancelFlag, ProgressSink, RunOptions};
pub use classify::{ClassifierConfig, Outcome, ResultClassifier};
pub use errors::{ClassifierError, ConfigError};
pub use export::ExportDoc;
pub use heatmap::{Heatmap, HeatmapCell};
pub use hw::{ResponseSource, TriggerSink};
pub use phased::{Phase, PhasedCampaign, PhasedConfig, PhasedResult, PhasedState};
pub use profile::{AttackTarget, BuiltinProfiles, Profile, ProfileStore};
pub use sim::{SimTarget, SimTargetConfig};
pub use space::{AxisRange, ParameterPoint, ParameterRegion, SweepRange};
pub use stats::CampaignStats;
pub use strategy::{SearchStrategy, StrategyKind};
