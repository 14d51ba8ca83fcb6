use super::args::{Cli, Command, PhasedArgs, ProfilesCommand, RunArgs};
use faultline_core::{
    AttackTarget, BuiltinProfiles, Campaign, CampaignConfig, ClassifierConfig, PhasedCampaign,
    PhasedConfig, Profile, ProfileStore, ResultClassifier, RunOptions, SimTarget, StrategyKind,
    SweepRange,
};
use std::sync::Arc;
use std::time::Duration;

/// The simulated target answers in-process, so campaigns can run with much
/// tighter timing than real hardware would tolerate.
fn sim_campaign_config() -> CampaignConfig {
    CampaignConfig {
        settle: Duration::from_millis(2),
        read_timeout: Duration::from_millis(10),
        poll_interval: Duration::from_millis(1),
        ..Default::default()
    }
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Run(args) => run_campaign(args).await,
        Command::Phased(args) => run_phased(args).await,
        Command::Profiles { command } => {
            run_profiles(&command);
            Ok(())
        }
    }
}

async fn run_campaign(args: RunArgs) -> anyhow::Result<()> {
    let range = SweepRange::new(args.width, args.offset);
    let kind = StrategyKind::parse(&args.strategy)?;
    let mut strategy = kind.build(&range, args.seed, args.max_attempts)?;

    let classifier = ResultClassifier::new(
        ClassifierConfig {
            success_patterns: args.success_patterns,
            ..Default::default()
        }
        .with_default_crash_patterns(),
    )?;

    let target = Arc::new(SimTarget::default());
    let config = CampaignConfig {
        offset_adjust_ns: args.offset_adjust_ns,
        ..sim_campaign_config()
    };
    let mut campaign = Campaign::new(target.clone(), target, classifier, config);

    let mut opts = RunOptions::new(args.max_attempts).with_cooldown(Duration::ZERO);
    if args.stop_on_success {
        opts = opts.stop_on_success();
    }
    let stats = campaign.run(strategy.as_mut(), &opts).await?;

    println!(
        "{} attempts in {:.1}s: {} success, {} crash, {} mute, {} normal, {} timeout",
        stats.total_attempts,
        stats.elapsed_secs(),
        stats.successes,
        stats.crashes,
        stats.mutes,
        stats.normals,
        stats.timeouts,
    );
    if let Some(best) = stats.best_point {
        println!("best point: width={}ns offset={}ns", best.width_ns, best.offset_ns);
    }
    let interesting = campaign.heatmap().interesting_cells();
    if !interesting.is_empty() {
        println!("interesting cells:");
        for cell in interesting {
            println!("  width={}ns offset={}ns", cell.width_ns, cell.offset_ns);
        }
    }

    if let Some(path) = args.export {
        campaign.export().save(&path)?;
        println!("exported to {}", path.display());
    }
    Ok(())
}

async fn run_phased(args: PhasedArgs) -> anyhow::Result<()> {
    let db = BuiltinProfiles::new();
    let target = args.target.as_deref().map(AttackTarget::parse).transpose()?;
    let profile = db.resolve(args.profile.as_deref(), args.chip.as_deref(), target)?;
    println!("profile: {} ({})", profile.name, profile.chip_family);

    let target = Arc::new(SimTarget::default());
    let config = PhasedConfig {
        seed: args.seed,
        fine_tune: !args.no_fine_tune,
        cooldown: Duration::ZERO,
        ..Default::default()
    };
    let mut workflow = PhasedCampaign::new(
        target.clone(),
        target.clone(),
        profile,
        sim_campaign_config(),
        config,
    )?;
    let result = workflow.run().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        if let Some(path) = args.export {
            workflow.campaign().export().save(&path)?;
        }
        return Ok(());
    }

    println!("state: {:?}", result.state);
    for report in &result.phases {
        println!(
            "  {:?}: {} attempts, {} successes",
            report.phase, report.attempts, report.successes
        );
    }
    if result.success_map.is_empty() {
        println!("no successful parameters found");
    } else {
        println!("success map:");
        for (width, offsets) in &result.success_map {
            println!("  width={width}ns offsets={offsets:?}");
        }
    }

    if let Some(path) = args.export {
        workflow.campaign().export().save(&path)?;
        println!("exported to {}", path.display());
    }
    Ok(())
}

fn run_profiles(command: &ProfilesCommand) {
    let db = BuiltinProfiles::new();
    match command {
        ProfilesCommand::List => {
            for profile in db.all() {
                println!("{:<28} {:<12} {}", profile.name, profile.chip_family, profile.description);
            }
        }
        ProfilesCommand::Show { name } => match db.get(name) {
            Some(profile) => print_profile(profile),
            None => println!("no profile named '{name}'"),
        },
        ProfilesCommand::Chip { chip } => {
            let matches = db.find_by_chip(chip);
            if matches.is_empty() {
                println!("no profiles for chip '{chip}'");
            }
            for profile in matches {
                println!("{:<28} {}", profile.name, profile.description);
            }
        }
        ProfilesCommand::Search { query } => {
            for profile in db.search(query) {
                println!("{:<28} {}", profile.name, profile.description);
            }
        }
    }
}

fn print_profile(profile: &Profile) {
    println!("{}", profile.name);
    println!("  family: {}", profile.chip_family);
    if !profile.specific_chips.is_empty() {
        println!("  chips: {}", profile.specific_chips.join(", "));
    }
    println!("  target: {:?}", profile.target);
    println!("  {}", profile.description);
    for known in &profile.known_params {
        println!(
            "  known: width={}ns offset={}ns  {}",
            known.point.width_ns, known.point.offset_ns, known.notes
        );
    }
    if let Some(range) = &profile.recommended_range {
        println!(
            "  range: width {}..={} step {}, offset {}..={} step {}",
            range.width.min,
            range.width.max,
            range.width.step,
            range.offset.min,
            range.offset.max,
            range.offset.step,
        );
    }
    if !profile.success_patterns.is_empty() {
        println!("  success patterns: {:?}", profile.success_patterns);
    }
    if !profile.trigger_event.is_empty() {
        println!("  trigger: {}", profile.trigger_event);
    }
    if !profile.source.is_empty() {
        println!("  source: {}", profile.source);
    }
    if !profile.tags.is_empty() {
        println!("  tags: {}", profile.tags.join(", "));
    }
}
