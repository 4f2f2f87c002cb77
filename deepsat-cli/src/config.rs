//! Configuration module
//!
//! Layers CLI flags over the runner configuration loaded from the
//! environment.

use anyhow::{Context, Result};
use clap::Args;
use deepsat_core::ConfigError;
use deepsat_runner::config::parse_module_list;
use deepsat_runner::{Program, RunnerConfig, SchedulerKind};
use tracing::{debug, info};

/// Flags shared by every subcommand
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Scheduler backend: slurm or local
    #[arg(long, global = true)]
    pub scheduler: Option<String>,

    /// Environment module to load before invocation (repeatable, comma separated)
    #[arg(long = "module", global = true, value_delimiter = ',')]
    pub modules: Vec<String>,

    /// Do not load any environment modules
    #[arg(long, global = true, conflicts_with = "modules")]
    pub no_modules: bool,

    /// Program to invoke, e.g. "python preprocess.py"
    #[arg(long, global = true)]
    pub program: Option<String>,

    /// Skip the post-run resource usage report
    #[arg(long, global = true)]
    pub no_report: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Loads the runner configuration and applies CLI overrides
///
/// Every failure is reported as `ConfigError::Settings`.
pub fn load_config(args: &GlobalArgs) -> Result<RunnerConfig> {
    let config = build_config(args)
        .map_err(|e| anyhow::Error::new(ConfigError::Settings(format!("{:#}", e))))?;

    info!("Using {} scheduler", config.scheduler);
    debug!("Runner configuration: {:?}", config);

    Ok(config)
}

fn build_config(args: &GlobalArgs) -> Result<RunnerConfig> {
    let mut config =
        RunnerConfig::from_env().context("Failed to load configuration from environment")?;

    if let Some(scheduler) = &args.scheduler {
        config.scheduler = scheduler.parse::<SchedulerKind>()?;
    }

    if args.no_modules {
        config.modules.clear();
    } else if !args.modules.is_empty() {
        config.modules = parse_module_list(&args.modules.join(","));
    }

    if let Some(program) = &args.program {
        config.program = program.parse::<Program>()?;
    }

    if args.no_report {
        config.report_usage = false;
    }

    config.validate()?;
    Ok(config)
}
