//! End-to-end campaign behavior against the simulated target.

use faultline_core::strategy::GridStrategy;
use faultline_core::{
    AxisRange, Campaign, CampaignConfig, CampaignStats, ClassifierConfig, Outcome,
    ResultClassifier, RunOptions, SimTarget, SimTargetConfig, SweepRange,
};
use std::sync::Arc;
use std::time::Duration;

fn fast_config() -> CampaignConfig {
    CampaignConfig {
        settle: Duration::from_millis(5),
        read_timeout: Duration::from_millis(20),
        poll_interval: Duration::from_millis(2),
        ..Default::default()
    }
}

fn classifier() -> ResultClassifier {
    ResultClassifier::new(
        ClassifierConfig {
            success_patterns: vec!["flag{".into()],
            ..Default::default()
        }
        .with_default_crash_patterns(),
    )
    .expect("valid patterns")
}

fn campaign(target: &Arc<SimTarget>) -> Campaign {
    Campaign::new(target.clone(), target.clone(), classifier(), fast_config())
}

#[tokio::test]
async fn grid_covers_the_lattice_in_row_major_order() {
    // The whole range sits far from the sim's vulnerable window, so every
    // trial boots normally.
    let target = Arc::new(SimTarget::default());
    let mut campaign = campaign(&target);
    let mut strategy = GridStrategy::new(SweepRange::new(
        AxisRange::new(300, 400, 50),
        AxisRange::new(8000, 8100, 100),
    ));

    let stats = campaign
        .run(
            &mut strategy,
            &RunOptions::new(1000).with_cooldown(Duration::ZERO),
        )
        .await
        .expect("run succeeds");

    assert_eq!(stats.total_attempts, 6);
    assert_eq!(stats.normals, 6);
    let visited: Vec<_> = campaign
        .log()
        .iter()
        .map(|a| (a.point.width_ns, a.point.offset_ns))
        .collect();
    assert_eq!(
        visited,
        vec![
            (300, 8000),
            (300, 8100),
            (350, 8000),
            (350, 8100),
            (400, 8000),
            (400, 8100),
        ]
    );
}

#[tokio::test]
async fn cancellation_stops_after_exactly_n_attempts() {
    let target = Arc::new(SimTarget::default());
    let mut campaign = campaign(&target);
    let cancel = campaign.cancel_flag();

    // Cancel from the progress callback of the third trial; the flag is
    // honored at the next loop top, never mid-trial.
    campaign = campaign.with_progress(Arc::new(move |iteration, _, _| {
        if iteration == 2 {
            cancel.cancel();
        }
    }));

    let mut strategy = GridStrategy::new(SweepRange::new(
        AxisRange::new(300, 400, 10),
        AxisRange::new(8000, 9000, 100),
    ));
    let stats = campaign
        .run(
            &mut strategy,
            &RunOptions::new(1000).with_cooldown(Duration::ZERO),
        )
        .await
        .expect("run succeeds");

    assert_eq!(stats.total_attempts, 3);
    assert_eq!(campaign.log().len(), 3);
    assert_eq!(target.fire_count(), 3);
}

#[tokio::test]
async fn repeated_configuration_of_the_same_point_is_harmless() {
    let target = Arc::new(SimTarget::new(SimTargetConfig {
        success_rate: 0.0,
        ..Default::default()
    }));
    let mut campaign = campaign(&target);

    // Same lattice point five times over.
    let mut strategy = GridStrategy::with_repeats(
        SweepRange::new(AxisRange::new(300, 300, 1), AxisRange::new(8000, 8000, 1)),
        5,
    );
    let stats = campaign
        .run(
            &mut strategy,
            &RunOptions::new(100).with_cooldown(Duration::ZERO),
        )
        .await
        .expect("run succeeds");

    assert_eq!(stats.total_attempts, 5);
    assert_eq!(target.configure_count(), 5);
    assert!(campaign
        .log()
        .iter()
        .all(|a| a.point.width_ns == 300 && a.point.offset_ns == 8000));
}

#[tokio::test]
async fn stats_always_rederivable_from_the_log() {
    let target = Arc::new(SimTarget::default());
    let mut campaign = campaign(&target);

    // Range straddles the window, its crash halo, and normal space.
    let mut strategy = GridStrategy::new(SweepRange::new(
        AxisRange::new(100, 300, 20),
        AxisRange::new(3300, 3700, 100),
    ));
    let stats = campaign
        .run(
            &mut strategy,
            &RunOptions::new(1000).with_cooldown(Duration::ZERO),
        )
        .await
        .expect("run succeeds");

    assert!(stats.successes > 0, "range includes the vulnerable window");
    assert!(stats.crashes > 0, "range includes the crash halo");
    assert!(stats.counts_match(&CampaignStats::from_log(campaign.log())));
    assert_eq!(
        stats.total_attempts,
        stats.successes + stats.crashes + stats.mutes + stats.normals + stats.timeouts
    );
}

#[tokio::test]
async fn success_inside_window_is_classified_and_recorded() {
    let target = Arc::new(SimTarget::default());
    let mut campaign = campaign(&target);
    let mut strategy = GridStrategy::new(SweepRange::new(
        AxisRange::new(120, 120, 1),
        AxisRange::new(3500, 3500, 1),
    ));

    let stats = campaign
        .run(
            &mut strategy,
            &RunOptions::new(10).with_cooldown(Duration::ZERO),
        )
        .await
        .expect("run succeeds");

    assert_eq!(stats.successes, 1);
    assert_eq!(campaign.log()[0].outcome, Outcome::Success);
    assert!(campaign.successes()[0].raw_output.contains("flag{"));
    assert_eq!(stats.best_point, Some(campaign.log()[0].point));
}
