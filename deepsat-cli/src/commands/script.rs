//! Script command handler

use anyhow::Result;
use clap::Args;
use deepsat_runner::RunnerConfig;
use deepsat_runner::batch::BatchScript;

use crate::args::{JobArgs, ResourceArgs};

#[derive(Args)]
pub struct ScriptArgs {
    #[command(flatten)]
    pub job: JobArgs,

    #[command(flatten)]
    pub resources: ResourceArgs,
}

/// Print the batch script without submitting it
pub fn handle_script(args: ScriptArgs, config: &RunnerConfig) -> Result<()> {
    let job = args.job.into_job_spec()?;
    let resources = args.resources.into_request();

    print!("{}", BatchScript::new(job, resources, config).render()?);
    Ok(())
}
