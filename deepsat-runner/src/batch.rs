//! Batch submission
//!
//! Renders a launch as a self-contained Slurm batch script and submits it
//! with `sbatch`. The script performs the same sequence as the launcher,
//! with Slurm doing the allocation from the `#SBATCH` directives.

use deepsat_core::domain::job::JobSpec;
use deepsat_core::domain::resources::ResourceRequest;
use deepsat_core::shell;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::info;

use crate::config::{Program, RunnerConfig};
use crate::error::{ENVIRONMENT_EXIT_CODE, InvocationError, LaunchError, Result};
use crate::process;
use crate::scheduler::slurm::resource_flags;

/// A renderable batch script for one job
#[derive(Debug, Clone)]
pub struct BatchScript {
    pub job: JobSpec,
    pub resources: ResourceRequest,
    pub program: Program,
    pub modules: Vec<String>,
    pub report_usage: bool,
}

impl BatchScript {
    pub fn new(job: JobSpec, resources: ResourceRequest, config: &RunnerConfig) -> Self {
        Self {
            job,
            resources,
            program: config.program.clone(),
            modules: config.modules.clone(),
            report_usage: config.report_usage,
        }
    }

    /// Renders the script text
    ///
    /// Validates the job first so an invalid job never reaches `sbatch`.
    pub fn render(&self) -> Result<String> {
        self.job.validate()?;
        self.resources.validate()?;

        let mut script = String::from("#!/bin/bash\n");
        for flag in resource_flags(&self.resources) {
            script.push_str(&format!("#SBATCH {}\n", flag));
        }
        script.push('\n');

        // A missing module ends the job before the program starts
        for module in &self.modules {
            script.push_str(&format!(
                "module load {} || exit {}\n",
                shell::quote(module),
                ENVIRONMENT_EXIT_CODE
            ));
        }
        if !self.modules.is_empty() {
            script.push('\n');
        }

        let mut invocation = vec!["srun".to_string()];
        invocation.extend(self.program.argv(&self.job));
        script.push_str(&shell::join(&invocation));
        script.push('\n');
        script.push_str("status=$?\n");

        if self.report_usage {
            script.push_str("seff \"$SLURM_JOB_ID\" || true\n");
        }
        script.push_str("exit $status\n");

        Ok(script)
    }
}

/// A job accepted by `sbatch`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub job_id: String,
}

/// Submits batch scripts through `sbatch --parsable`
pub struct BatchSubmitter {
    sbatch: PathBuf,
}

impl BatchSubmitter {
    pub fn new(sbatch: PathBuf) -> Self {
        Self { sbatch }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(config.slurm_command("sbatch"))
    }

    /// Submits a script on stdin
    ///
    /// With `wait`, blocks until the job ends and fails with
    /// `InvocationError::ExitStatus` if the job exited non-zero.
    pub async fn submit(&self, script: &str, wait: bool) -> Result<Submission> {
        let mut command = Command::new(&self.sbatch);
        command.arg("--parsable");
        if wait {
            command.arg("--wait");
        }

        let output = process::capture_with_input(&mut command, script.as_bytes())
            .await
            .map_err(|e| {
                LaunchError::Scheduling(format!(
                    "failed to execute {}: {}",
                    self.sbatch.display(),
                    e
                ))
            })?;

        let Some(job_id) = parse_parsable(&output.stdout) else {
            return Err(LaunchError::Scheduling(format!(
                "sbatch exited with code {}: {}",
                output.code(),
                output.stderr.trim()
            )));
        };

        info!("Submitted batch job {}", job_id);

        if !output.success() {
            // A job id was issued, so the failure belongs to the job itself
            return Err(InvocationError::ExitStatus(output.code()).into());
        }

        Ok(Submission { job_id })
    }
}

/// Extracts the job id from `sbatch --parsable` output (`<id>[;<cluster>]`)
pub fn parse_parsable(stdout: &str) -> Option<String> {
    let line = stdout.lines().map(str::trim).find(|l| !l.is_empty())?;
    let id = line.split(';').next()?.trim();
    (!id.is_empty() && id.chars().all(|c| c.is_ascii_digit())).then(|| id.to_string())
}
