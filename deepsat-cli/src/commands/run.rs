//! Run command handler
//!
//! Runs the launcher sequence in the foreground and mirrors the program's
//! exit status.

use anyhow::Result;
use clap::Args;
use colored::*;
use deepsat_runner::{Launcher, RunnerConfig};

use crate::args::{JobArgs, ResourceArgs};

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub job: JobArgs,

    #[command(flatten)]
    pub resources: ResourceArgs,

    /// Print the launch outcome as JSON
    #[arg(long)]
    pub json: bool,
}

/// Handle the run command
pub async fn handle_run(args: RunArgs, config: &RunnerConfig) -> Result<()> {
    let job = args.job.into_job_spec()?;
    let resources = args.resources.into_request();

    let launcher = Launcher::from_config(config);
    let outcome = launcher.launch(&job, &resources).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!(
        "{} Job {} completed in {}",
        "✓".green().bold(),
        outcome.allocation_id.bold(),
        format!("{:.1?}", outcome.record.elapsed()).dimmed()
    );

    Ok(())
}
