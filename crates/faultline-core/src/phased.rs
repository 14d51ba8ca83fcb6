//! Profile-guided multi-phase attack workflow.
//!
//! Documented parameters are cheap to try and often reproduce, so the
//! workflow replays them before committing to any sweep:
//!
//! 1. KNOWN_PARAMS  - replay each documented point, stop on success
//! 2. COARSE_SWEEP  - adaptive region search over the recommended range,
//!                    skipped entirely when phase 1 already succeeded
//! 3. FINE_TUNE     - dense local grid around each distinct success
//!
//! Cancellation can interrupt any phase; the workflow then reports the
//! CANCELLED terminal state instead of DONE.

use crate::attempt::{distinct_success_points, SuccessRecord};
use crate::campaign::{Campaign, CampaignConfig, RunOptions};
use crate::classify::{ClassifierConfig, ResultClassifier};
use crate::errors::{ClassifierError, ConfigError};
use crate::hw::{ResponseSource, TriggerSink};
use crate::profile::Profile;
use crate::stats::CampaignStats;
use crate::strategy::{GridStrategy, RegionAdaptiveStrategy, ReplayStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Trial-producing workflow phases. Tagged onto success records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    KnownParams,
    CoarseSweep,
    FineTune,
}

/// Workflow state machine. INIT and the three phases are transient;
/// DONE and CANCELLED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhasedState {
    Init,
    KnownParams,
    CoarseSweep,
    FineTune,
    Done,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct PhasedConfig {
    pub replay_known_params: bool,
    /// Attempts per documented parameter point.
    pub known_params_attempts: u32,
    pub coarse_sweep: bool,
    /// Attempts per lattice point during the coarse sweep.
    pub coarse_attempts_per_point: u32,
    pub fine_tune: bool,
    pub fine_tune_radius_ns: u64,
    pub fine_tune_step_ns: u64,
    /// Attempts per lattice point during fine-tuning.
    pub fine_tune_attempts: u32,
    /// Overrides the profile's success patterns when set.
    pub success_patterns: Option<Vec<String>>,
    pub seed: u64,
    pub cooldown: Duration,
}

impl Default for PhasedConfig {
    fn default() -> Self {
        Self {
            replay_known_params: true,
            known_params_attempts: 50,
            coarse_sweep: true,
            coarse_attempts_per_point: 3,
            fine_tune: true,
            fine_tune_radius_ns: 50,
            fine_tune_step_ns: 5,
            fine_tune_attempts: 10,
            success_patterns: None,
            seed: 0,
            cooldown: Duration::from_millis(10),
        }
    }
}

/// Attempt/success breakdown for one executed phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub attempts: u32,
    pub successes: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhasedResult {
    pub state: PhasedState,
    pub profile_name: String,
    pub phases: Vec<PhaseReport>,
    pub stats: CampaignStats,
    pub successes: Vec<SuccessRecord>,
    /// width_ns -> sorted distinct offsets that succeeded there.
    pub success_map: BTreeMap<u64, Vec<u64>>,
}

pub struct PhasedCampaign {
    profile: Profile,
    config: PhasedConfig,
    campaign: Campaign,
    state: PhasedState,
}

impl PhasedCampaign {
    pub fn new(
        trigger: Arc<dyn TriggerSink>,
        source: Arc<dyn ResponseSource>,
        profile: Profile,
        campaign_config: CampaignConfig,
        config: PhasedConfig,
    ) -> Result<Self, ClassifierError> {
        let success_patterns = config
            .success_patterns
            .clone()
            .unwrap_or_else(|| profile.success_patterns.clone());
        let classifier = ResultClassifier::new(
            ClassifierConfig {
                success_patterns,
                ..Default::default()
            }
            .with_default_crash_patterns(),
        )?;
        Ok(Self {
            profile,
            config,
            campaign: Campaign::new(trigger, source, classifier, campaign_config),
            state: PhasedState::Init,
        })
    }

    pub fn state(&self) -> PhasedState {
        self.state
    }

    pub fn campaign(&self) -> &Campaign {
        &self.campaign
    }

    pub fn cancel_flag(&self) -> crate::campaign::CancelFlag {
        self.campaign.cancel_flag()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.config.replay_known_params && self.config.known_params_attempts == 0 {
            return Err(ConfigError::ZeroBudget);
        }
        if self.config.coarse_sweep && self.config.coarse_attempts_per_point == 0 {
            return Err(ConfigError::ZeroBudget);
        }
        if self.config.fine_tune {
            if self.config.fine_tune_attempts == 0 {
                return Err(ConfigError::ZeroBudget);
            }
            if self.config.fine_tune_step_ns == 0 {
                return Err(ConfigError::ZeroStep("fine_tune".to_string()));
            }
        }
        if let Some(range) = &self.profile.recommended_range {
            range.validate()?;
        }
        Ok(())
    }

    pub async fn run(&mut self) -> anyhow::Result<PhasedResult> {
        self.validate()?;
        let cancel = self.campaign.cancel_flag();
        let mut reports = Vec::new();

        tracing::info!(profile = %self.profile.name, "phased campaign started");

        // PHASE 1: replay documented parameters.
        if self.config.replay_known_params && !self.profile.known_params.is_empty() {
            if cancel.is_cancelled() {
                return Ok(self.finish(PhasedState::Cancelled, reports));
            }
            self.enter(PhasedState::KnownParams, Some(Phase::KnownParams));
            let before = self.snapshot();

            for known in self.profile.known_params.clone() {
                if cancel.is_cancelled() || self.campaign.stats().successes > 0 {
                    break;
                }
                tracing::info!(
                    width_ns = known.point.width_ns,
                    offset_ns = known.point.offset_ns,
                    notes = %known.notes,
                    "replaying documented parameters"
                );
                let budget = self
                    .config
                    .known_params_attempts
                    .saturating_mul(known.repeat.max(1));
                let mut strategy = ReplayStrategy::new(known.point, budget);
                let opts = RunOptions::new(budget)
                    .stop_on_success()
                    .with_cooldown(self.config.cooldown);
                self.campaign.run(&mut strategy, &opts).await?;
            }
            reports.push(self.report(Phase::KnownParams, before));
        }

        if cancel.is_cancelled() {
            return Ok(self.finish(PhasedState::Cancelled, reports));
        }

        // PHASE 2: coarse sweep, skipped when phase 1 already reproduced.
        if self.config.coarse_sweep && self.campaign.stats().successes == 0 {
            self.enter(PhasedState::CoarseSweep, Some(Phase::CoarseSweep));
            let before = self.snapshot();

            let range = self.profile.sweep_range();
            range.validate()?;
            let budget = saturating_u32(
                u128::from(range.lattice_len())
                    * u128::from(self.config.coarse_attempts_per_point),
            );
            let mut strategy = RegionAdaptiveStrategy::new(range, self.config.seed);
            let opts = RunOptions::new(budget).with_cooldown(self.config.cooldown);
            self.campaign.run(&mut strategy, &opts).await?;
            reports.push(self.report(Phase::CoarseSweep, before));
        }

        if cancel.is_cancelled() {
            return Ok(self.finish(PhasedState::Cancelled, reports));
        }

        // PHASE 3: dense grid around each distinct success.
        if self.config.fine_tune && !self.campaign.successes().is_empty() {
            self.enter(PhasedState::FineTune, Some(Phase::FineTune));
            let before = self.snapshot();

            let centers = distinct_success_points(self.campaign.successes());
            tracing::info!(centers = centers.len(), "fine-tuning around successes");
            for center in centers {
                if cancel.is_cancelled() {
                    break;
                }
                let mut strategy = GridStrategy::around(
                    center,
                    self.config.fine_tune_radius_ns,
                    self.config.fine_tune_step_ns,
                    self.config.fine_tune_attempts,
                );
                let window = crate::space::SweepRange::around(
                    center,
                    self.config.fine_tune_radius_ns,
                    self.config.fine_tune_step_ns,
                );
                let budget = saturating_u32(
                    u128::from(window.lattice_len()) * u128::from(self.config.fine_tune_attempts),
                );
                let opts = RunOptions::new(budget).with_cooldown(self.config.cooldown);
                self.campaign.run(&mut strategy, &opts).await?;
            }
            reports.push(self.report(Phase::FineTune, before));
        }

        let terminal = if cancel.is_cancelled() {
            PhasedState::Cancelled
        } else {
            PhasedState::Done
        };
        Ok(self.finish(terminal, reports))
    }

    fn enter(&mut self, state: PhasedState, phase: Option<Phase>) {
        tracing::info!(?state, "phase transition");
        self.state = state;
        self.campaign.set_phase(phase);
    }

    fn snapshot(&self) -> (u32, u32) {
        (
            self.campaign.stats().total_attempts,
            self.campaign.stats().successes,
        )
    }

    fn report(&self, phase: Phase, before: (u32, u32)) -> PhaseReport {
        let stats = self.campaign.stats();
        PhaseReport {
            phase,
            attempts: stats.total_attempts - before.0,
            successes: stats.successes - before.1,
        }
    }

    fn finish(&mut self, state: PhasedState, phases: Vec<PhaseReport>) -> PhasedResult {
        self.state = state;
        let successes = self.campaign.successes().to_vec();
        let mut success_map: BTreeMap<u64, Vec<u64>> = BTreeMap::new();
        for s in &successes {
            let offsets = success_map.entry(s.point.width_ns).or_default();
            if !offsets.contains(&s.point.offset_ns) {
                offsets.push(s.point.offset_ns);
            }
        }
        for offsets in success_map.values_mut() {
            offsets.sort_unstable();
        }
        tracing::info!(
            ?state,
            successes = successes.len(),
            attempts = self.campaign.stats().total_attempts,
            "phased campaign finished"
        );
        PhasedResult {
            state,
            profile_name: self.profile.name.clone(),
            phases,
            stats: self.campaign.stats().clone(),
            successes,
            success_map,
        }
    }
}

fn saturating_u32(value: u128) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
