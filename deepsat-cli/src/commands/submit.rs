//! Submit command handler

use anyhow::Result;
use clap::Args;
use colored::*;
use deepsat_runner::RunnerConfig;
use deepsat_runner::batch::{BatchScript, BatchSubmitter};

use crate::args::{JobArgs, ResourceArgs};

#[derive(Args)]
pub struct SubmitArgs {
    #[command(flatten)]
    pub job: JobArgs,

    #[command(flatten)]
    pub resources: ResourceArgs,

    /// Wait for the job to finish and exit with its status
    #[arg(long)]
    pub wait: bool,
}

/// Handle the submit command
pub async fn handle_submit(args: SubmitArgs, config: &RunnerConfig) -> Result<()> {
    let job = args.job.into_job_spec()?;
    let resources = args.resources.into_request();

    let script = BatchScript::new(job, resources, config).render()?;
    let submission = BatchSubmitter::from_config(config)
        .submit(&script, args.wait)
        .await?;

    if args.wait {
        println!(
            "{} Batch job {} completed",
            "✓".green().bold(),
            submission.job_id.bold()
        );
    } else {
        println!("Submitted batch job {}", submission.job_id.bold());
    }

    Ok(())
}
