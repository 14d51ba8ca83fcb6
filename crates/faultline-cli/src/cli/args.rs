use clap::{Args, Parser, Subcommand};
use faultline_core::AxisRange;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "faultline",
    version,
    about = "Fault-injection parameter search campaigns"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one search strategy against the built-in simulated target
    Run(RunArgs),
    /// Run the profile-guided phased workflow against the simulated target
    Phased(PhasedArgs),
    /// Query the chip profile database
    Profiles {
        #[command(subcommand)]
        command: ProfilesCommand,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Strategy: grid, random, adaptive or explore
    #[arg(long, default_value = "adaptive")]
    pub strategy: String,

    #[arg(long, default_value_t = 500)]
    pub max_attempts: u32,

    /// RNG seed for reproducible searches
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Width axis in ns, as min:max:step
    #[arg(long, default_value = "50:500:50", value_parser = parse_axis)]
    pub width: AxisRange,

    /// Offset axis in ns, as min:max:step
    #[arg(long, default_value = "1000:10000:500", value_parser = parse_axis)]
    pub offset: AxisRange,

    /// Response substring(s) treated as success
    #[arg(long = "success-pattern", default_value = "flag{")]
    pub success_patterns: Vec<String>,

    /// Halt at the first success
    #[arg(long)]
    pub stop_on_success: bool,

    /// Calibration adjustment applied to every configured offset
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub offset_adjust_ns: i64,

    /// Write the attempt log to this JSON file
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct PhasedArgs {
    /// Profile name, e.g. STM32F1_RDP_BYPASS
    #[arg(long)]
    pub profile: Option<String>,

    /// Target chip for profile lookup, e.g. STM32F103C8
    #[arg(long)]
    pub chip: Option<String>,

    /// Restrict chip lookup to one attack target: rdp, lockbit,
    /// secure-boot, auth, instruction-skip, loop-escape or general
    #[arg(long)]
    pub target: Option<String>,

    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Skip the fine-tuning phase
    #[arg(long)]
    pub no_fine_tune: bool,

    /// Print the full result as JSON instead of the summary
    #[arg(long)]
    pub json: bool,

    /// Write the attempt log to this JSON file
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum ProfilesCommand {
    /// List every built-in profile
    List,
    /// Full detail for one profile
    Show { name: String },
    /// Profiles applicable to a chip, most specific first
    Chip { chip: String },
    /// Keyword search over names, chips, descriptions and tags
    Search { query: String },
}

fn parse_axis(value: &str) -> Result<AxisRange, String> {
    let parts: Vec<&str> = value.split(':').collect();
    let [min, max, step] = parts.as_slice() else {
        return Err(format!("expected min:max:step, got '{value}'"));
    };
    let parse = |s: &str, what: &str| {
        s.parse::<u64>()
            .map_err(|_| format!("invalid {what} '{s}' in '{value}'"))
    };
    Ok(AxisRange::new(
        parse(min, "min")?,
        parse(max, "max")?,
        parse(step, "step")?,
    ))
}
