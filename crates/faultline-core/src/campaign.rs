//! The trial loop: drives one strategy against real hardware collaborators,
//! classifying and recording every attempt.

use crate::attempt::{Attempt, SuccessRecord};
use crate::classify::{Outcome, ResultClassifier};
use crate::errors::ConfigError;
use crate::export::ExportDoc;
use crate::heatmap::Heatmap;
use crate::hw::{ResponseSource, TriggerSink};
use crate::monitor::{MonitorBuffer, ResponseMonitor};
use crate::phased::Phase;
use crate::space::ParameterPoint;
use crate::stats::CampaignStats;
use crate::strategy::SearchStrategy;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const DIRECT_READ_BYTES: usize = 4096;

/// Campaign-scoped cancellation flag. Checked at the top of every loop
/// iteration: cancellation takes effect before the next trigger and never
/// interrupts a trial already in flight.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-campaign timing and recording knobs.
#[derive(Debug, Clone)]
pub struct CampaignConfig {
    /// Heatmap quantization steps.
    pub width_step: u64,
    pub offset_step: u64,
    /// Trigger-to-read settle interval.
    pub settle: Duration,
    /// Bound on the fallback direct read when the drain buffer is empty.
    pub read_timeout: Duration,
    /// Monitor drain poll interval.
    pub poll_interval: Duration,
    /// Calibration latency adjustment applied to every offset before the
    /// trigger is configured. Measured externally.
    pub offset_adjust_ns: i64,
    /// Stored response excerpt cap.
    pub max_excerpt_bytes: usize,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            width_step: 10,
            offset_step: 100,
            settle: Duration::from_millis(100),
            read_timeout: Duration::from_millis(500),
            poll_interval: Duration::from_millis(50),
            offset_adjust_ns: 0,
            max_excerpt_bytes: 256,
        }
    }
}

/// Bounds for one `run` call.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub max_attempts: u32,
    pub stop_on_success: bool,
    /// Rate-limits the hardware and lets the target recover from
    /// crash-class outcomes.
    pub cooldown: Duration,
}

impl RunOptions {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            stop_on_success: false,
            cooldown: Duration::from_millis(10),
        }
    }

    pub fn stop_on_success(mut self) -> Self {
        self.stop_on_success = true;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

/// Invoked after every trial with `(iteration, outcome, running stats)`.
/// The contract is synchronous and non-blocking; callers needing slow work
/// must offload it themselves.
pub type ProgressSink = Arc<dyn Fn(u32, Outcome, &CampaignStats) + Send + Sync>;

pub struct Campaign {
    trigger: Arc<dyn TriggerSink>,
    source: Arc<dyn ResponseSource>,
    classifier: ResultClassifier,
    config: CampaignConfig,
    phase: Option<Phase>,
    log: Vec<Attempt>,
    stats: CampaignStats,
    heatmap: Heatmap,
    successes: Vec<SuccessRecord>,
    cancel: CancelFlag,
    progress: Option<ProgressSink>,
}

impl Campaign {
    pub fn new(
        trigger: Arc<dyn TriggerSink>,
        source: Arc<dyn ResponseSource>,
        classifier: ResultClassifier,
        config: CampaignConfig,
    ) -> Self {
        let heatmap = Heatmap::new(config.width_step, config.offset_step);
        Self {
            trigger,
            source,
            classifier,
            config,
            phase: None,
            log: Vec::new(),
            stats: CampaignStats::default(),
            heatmap,
            successes: Vec::new(),
            cancel: CancelFlag::new(),
            progress: None,
        }
    }

    /// Tag success records with the workflow phase that produced them.
    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Phase tag for subsequent trials; used by the phased workflow as it
    /// moves through its states.
    pub fn set_phase(&mut self, phase: Option<Phase>) {
        self.phase = phase;
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn log(&self) -> &[Attempt] {
        &self.log
    }

    pub fn stats(&self) -> &CampaignStats {
        &self.stats
    }

    pub fn heatmap(&self) -> &Heatmap {
        &self.heatmap
    }

    pub fn successes(&self) -> &[SuccessRecord] {
        &self.successes
    }

    /// Run trials until the budget is spent, the strategy exhausts,
    /// cancellation is requested, or (with `stop_on_success`) a success
    /// lands. Configuration errors surface here, before any trial.
    pub async fn run(
        &mut self,
        strategy: &mut dyn SearchStrategy,
        opts: &RunOptions,
    ) -> anyhow::Result<CampaignStats> {
        if opts.max_attempts == 0 {
            return Err(ConfigError::ZeroBudget.into());
        }

        if self.stats.started_at.is_none() {
            self.stats.started_at = Some(Utc::now());
        }
        tracing::info!(
            strategy = strategy.name(),
            max_attempts = opts.max_attempts,
            "campaign started"
        );

        let monitor = ResponseMonitor::start(self.source.clone(), self.config.poll_interval);
        let buffer = monitor.buffer();

        let mut performed = 0u32;
        while performed < opts.max_attempts {
            if self.cancel.is_cancelled() {
                tracing::info!(attempts = performed, "campaign cancelled");
                break;
            }
            let Some(point) = strategy.next(&self.log) else {
                tracing::debug!("strategy exhausted");
                break;
            };

            let outcome = self.run_trial(&buffer, point).await;
            performed += 1;
            strategy.observe(point, outcome);

            if let Some(sink) = &self.progress {
                let iteration = self.log.len() as u32 - 1;
                sink(iteration, outcome, &self.stats);
            }

            if opts.stop_on_success && outcome == Outcome::Success {
                break;
            }
            if !opts.cooldown.is_zero() {
                tokio::time::sleep(opts.cooldown).await;
            }
        }

        monitor.stop().await;
        self.stats.finish();
        tracing::info!(
            attempts = self.stats.total_attempts,
            successes = self.stats.successes,
            "campaign finished"
        );
        Ok(self.stats.clone())
    }

    /// One trial. Hardware I/O failure is recoverable: it is recorded as a
    /// Timeout outcome with the error text and the loop moves on.
    async fn run_trial(&mut self, buffer: &MonitorBuffer, point: ParameterPoint) -> Outcome {
        let timestamp = Utc::now();
        let started = Instant::now();
        let adjusted = point.with_offset_adjust(self.config.offset_adjust_ns);

        let (outcome, excerpt, raw) = match self.execute_trial(buffer, adjusted).await {
            Ok(data) => {
                let outcome = self.classifier.classify(Some(&data), false);
                let raw = String::from_utf8_lossy(&data).into_owned();
                let excerpt = truncate_excerpt(&raw, self.config.max_excerpt_bytes);
                (outcome, excerpt, raw)
            }
            Err(e) => {
                tracing::warn!(error = %e, ?point, "trial I/O failed, recording timeout");
                let text = truncate_excerpt(&e.to_string(), self.config.max_excerpt_bytes);
                (Outcome::Timeout, text, String::new())
            }
        };

        let attempt = Attempt {
            point,
            outcome,
            timestamp,
            response_excerpt: excerpt,
            latency_ms: started.elapsed().as_secs_f64() * 1000.0,
            iteration: self.log.len() as u32,
        };
        self.record(attempt, &raw);
        outcome
    }

    async fn execute_trial(
        &self,
        buffer: &MonitorBuffer,
        point: ParameterPoint,
    ) -> anyhow::Result<Vec<u8>> {
        self.trigger.configure(point).await?;
        // Clear immediately before firing so the read for this trial never
        // sees output from the previous one.
        buffer.clear();
        self.trigger.fire().await?;
        tokio::time::sleep(self.config.settle).await;

        let mut data = buffer.take();
        if data.is_empty() {
            // Late arrival past the settle window: one bounded direct read,
            // then pick up whatever the drain task grabbed meanwhile.
            let direct = self
                .source
                .read(DIRECT_READ_BYTES, self.config.read_timeout)
                .await?;
            data.extend_from_slice(&direct);
            data.extend_from_slice(&buffer.take());
        }
        Ok(data)
    }

    fn record(&mut self, attempt: Attempt, raw_output: &str) {
        self.stats.record(&attempt);
        self.heatmap.record(attempt.point, attempt.outcome);
        if attempt.outcome == Outcome::Success {
            tracing::info!(
                width_ns = attempt.point.width_ns,
                offset_ns = attempt.point.offset_ns,
                "glitch success"
            );
            self.successes.push(SuccessRecord {
                point: attempt.point,
                phase: self.phase,
                raw_output: raw_output.to_string(),
            });
        } else {
            tracing::debug!(
                width_ns = attempt.point.width_ns,
                offset_ns = attempt.point.offset_ns,
                outcome = %attempt.outcome,
                "trial recorded"
            );
        }
        self.log.push(attempt);
    }

    pub fn export(&self) -> ExportDoc {
        ExportDoc::from_campaign(&self.stats, &self.log)
    }

    /// Resume from a previously exported attempt log: appends the attempts
    /// and re-derives stats, heatmap and success list from the log.
    pub fn import_log(&mut self, attempts: Vec<Attempt>) {
        for attempt in attempts {
            let raw = attempt.response_excerpt.clone();
            let renumbered = Attempt {
                iteration: self.log.len() as u32,
                ..attempt
            };
            self.record(renumbered, &raw);
        }
        tracing::info!(total = self.log.len(), "attempt log imported");
    }
}

fn truncate_excerpt(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ClassifierConfig;
    use crate::space::{AxisRange, SweepRange};
    use crate::strategy::GridStrategy;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Always answers with a fixed line after each fire.
    struct ScriptedTarget {
        response: &'static [u8],
        pending: Mutex<Vec<u8>>,
        configured: Mutex<Vec<ParameterPoint>>,
    }

    impl ScriptedTarget {
        fn new(response: &'static [u8]) -> Arc<Self> {
            Arc::new(Self {
                response,
                pending: Mutex::new(Vec::new()),
                configured: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TriggerSink for ScriptedTarget {
        async fn configure(&self, point: ParameterPoint) -> anyhow::Result<()> {
            self.configured.lock().unwrap().push(point);
            Ok(())
        }

        async fn fire(&self) -> anyhow::Result<()> {
            self.pending.lock().unwrap().extend_from_slice(self.response);
            Ok(())
        }
    }

    #[async_trait]
    impl ResponseSource for ScriptedTarget {
        async fn read(&self, max: usize, _timeout: Duration) -> anyhow::Result<Vec<u8>> {
            let mut pending = self.pending.lock().unwrap();
            let n = pending.len().min(max);
            Ok(pending.drain(..n).collect())
        }
    }

    struct BrokenTrigger;

    #[async_trait]
    impl TriggerSink for BrokenTrigger {
        async fn configure(&self, _point: ParameterPoint) -> anyhow::Result<()> {
            Ok(())
        }

        async fn fire(&self) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("usb pipe stalled"))
        }
    }

    fn classifier() -> ResultClassifier {
        ResultClassifier::new(ClassifierConfig {
            success_patterns: vec!["flag{".into()],
            crash_patterns: vec!["reset".into()],
            mute_patterns: vec![],
        })
        .expect("valid patterns")
    }

    fn fast_config() -> CampaignConfig {
        CampaignConfig {
            settle: Duration::from_millis(5),
            read_timeout: Duration::from_millis(20),
            poll_interval: Duration::from_millis(2),
            ..Default::default()
        }
    }

    fn six_point_range() -> SweepRange {
        SweepRange::new(AxisRange::new(50, 150, 50), AxisRange::new(0, 100, 100))
    }

    #[tokio::test]
    async fn grid_run_visits_whole_lattice_and_keeps_stats_consistent() {
        let target = ScriptedTarget::new(b"boot ok\n");
        let mut campaign = Campaign::new(
            target.clone(),
            target.clone(),
            classifier(),
            fast_config(),
        );
        let mut strategy = GridStrategy::new(six_point_range());
        let stats = campaign
            .run(
                &mut strategy,
                &RunOptions::new(100).with_cooldown(Duration::ZERO),
            )
            .await
            .expect("run succeeds");

        assert_eq!(stats.total_attempts, 6);
        assert_eq!(stats.normals, 6);
        assert!(stats.counts_match(&CampaignStats::from_log(campaign.log())));

        let visited: Vec<_> = campaign
            .log()
            .iter()
            .map(|a| (a.point.width_ns, a.point.offset_ns))
            .collect();
        assert_eq!(
            visited,
            vec![(50, 0), (50, 100), (100, 0), (100, 100), (150, 0), (150, 100)]
        );
    }

    #[tokio::test]
    async fn hardware_failure_becomes_timeout_and_loop_continues() {
        let target = ScriptedTarget::new(b"ignored");
        let mut campaign = Campaign::new(
            Arc::new(BrokenTrigger),
            target,
            classifier(),
            fast_config(),
        );
        let mut strategy = GridStrategy::new(six_point_range());
        let stats = campaign
            .run(
                &mut strategy,
                &RunOptions::new(100).with_cooldown(Duration::ZERO),
            )
            .await
            .expect("run recovers from hw errors");

        assert_eq!(stats.total_attempts, 6);
        assert_eq!(stats.timeouts, 6);
        assert!(campaign.log()[0]
            .response_excerpt
            .contains("usb pipe stalled"));
    }

    #[tokio::test]
    async fn zero_budget_is_a_config_error_before_any_trial() {
        let target = ScriptedTarget::new(b"boot ok\n");
        let mut campaign = Campaign::new(
            target.clone(),
            target.clone(),
            classifier(),
            fast_config(),
        );
        let mut strategy = GridStrategy::new(six_point_range());
        let err = campaign
            .run(&mut strategy, &RunOptions::new(0))
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
        assert!(campaign.log().is_empty());
    }

    #[tokio::test]
    async fn stop_on_success_halts_after_first_hit() {
        let target = ScriptedTarget::new(b"flag{loot}\n");
        let mut campaign = Campaign::new(
            target.clone(),
            target.clone(),
            classifier(),
            fast_config(),
        );
        let mut strategy = GridStrategy::new(six_point_range());
        let stats = campaign
            .run(
                &mut strategy,
                &RunOptions::new(100)
                    .stop_on_success()
                    .with_cooldown(Duration::ZERO),
            )
            .await
            .expect("run succeeds");

        assert_eq!(stats.total_attempts, 1);
        assert_eq!(stats.successes, 1);
        assert_eq!(campaign.successes().len(), 1);
        assert!(campaign.successes()[0].raw_output.contains("flag{"));
    }

    #[tokio::test]
    async fn offset_adjust_shifts_configured_point_not_recorded_one() {
        let target = ScriptedTarget::new(b"boot ok\n");
        let config = CampaignConfig {
            offset_adjust_ns: -40,
            ..fast_config()
        };
        let mut campaign = Campaign::new(target.clone(), target.clone(), classifier(), config);
        let mut strategy = ReplayOnce;
        campaign
            .run(
                &mut strategy,
                &RunOptions::new(1).with_cooldown(Duration::ZERO),
            )
            .await
            .expect("run succeeds");

        let configured = target.configured.lock().unwrap();
        assert_eq!(configured[0].offset_ns, 60);
        assert_eq!(campaign.log()[0].point.offset_ns, 100);
    }

    struct ReplayOnce;

    impl SearchStrategy for ReplayOnce {
        fn name(&self) -> &'static str {
            "replay-once"
        }

        fn next(&mut self, log: &[Attempt]) -> Option<ParameterPoint> {
            if log.is_empty() {
                Some(ParameterPoint::new(100, 100))
            } else {
                None
            }
        }
    }

    #[test]
    fn excerpt_truncation_respects_char_boundaries() {
        let text = "héllo wörld";
        let cut = truncate_excerpt(text, 3);
        assert!(cut.len() <= 3);
        assert!(text.starts_with(&cut));
    }
}
