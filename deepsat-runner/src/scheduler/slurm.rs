//! Slurm scheduler
//!
//! Handles the allocation lifecycle on a Slurm cluster:
//! - Reusing the surrounding allocation when already running inside a job
//! - Requesting a new allocation with `salloc --no-shell`
//! - Running the program in the allocation with `srun --jobid`, with the
//!   requested time limit applied to the step
//! - Cancelling allocations this launch created

use async_trait::async_trait;
use deepsat_core::domain::resources::ResourceRequest;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, error, info};

use super::{Allocation, Scheduler};
use crate::config::RunnerConfig;
use crate::error::{LaunchError, Result};
use crate::process;

const GRANTED_MARKER: &str = "Granted job allocation";

/// Scheduler backed by Slurm command-line tools
#[derive(Debug, Clone)]
pub struct SlurmScheduler {
    salloc: PathBuf,
    srun: PathBuf,
    scancel: PathBuf,

    /// Job id of the allocation the launcher itself runs in, if any
    existing_job_id: Option<String>,
}

impl SlurmScheduler {
    /// Creates a scheduler using the configured Slurm tool paths
    ///
    /// Picks up `SLURM_JOB_ID` from the launcher's environment so a launch
    /// from inside a batch job runs in that job's allocation.
    pub fn from_config(config: &RunnerConfig) -> Self {
        let existing_job_id = std::env::var("SLURM_JOB_ID")
            .ok()
            .filter(|id| !id.trim().is_empty());

        Self {
            salloc: config.slurm_command("salloc"),
            srun: config.slurm_command("srun"),
            scancel: config.slurm_command("scancel"),
            existing_job_id,
        }
    }

    /// Overrides the detected surrounding allocation
    pub fn with_existing_job(mut self, job_id: Option<String>) -> Self {
        self.existing_job_id = job_id;
        self
    }
}

#[async_trait]
impl Scheduler for SlurmScheduler {
    fn name(&self) -> &'static str {
        "slurm"
    }

    async fn allocate(&self, request: &ResourceRequest) -> Result<Allocation> {
        if let Some(job_id) = &self.existing_job_id {
            info!("Running inside existing Slurm allocation {}", job_id);
            return Ok(Allocation {
                id: job_id.clone(),
                owned: false,
                time_limit: request.time_limit,
                deadline: None,
            });
        }

        let flags = resource_flags(request);
        info!("Requesting Slurm allocation: {}", flags.join(" "));

        let output = process::capture(
            Command::new(&self.salloc)
                .arg("--no-shell")
                .args(&flags),
        )
        .await
        .map_err(|e| {
            LaunchError::Scheduling(format!(
                "failed to execute {}: {}",
                self.salloc.display(),
                e
            ))
        })?;

        if !output.success() {
            let error_msg = format!(
                "salloc exited with code {}: {}",
                output.code(),
                output.stderr.trim()
            );
            error!("{}", error_msg);
            return Err(LaunchError::Scheduling(error_msg));
        }

        // salloc reports the grant on stderr
        let job_id = parse_granted_allocation(&output.stderr)
            .or_else(|| parse_granted_allocation(&output.stdout))
            .ok_or_else(|| {
                LaunchError::Scheduling(format!(
                    "salloc succeeded but reported no job allocation: '{}'",
                    output.stderr.trim()
                ))
            })?;

        info!("Granted Slurm allocation {}", job_id);
        Ok(Allocation {
            id: job_id,
            owned: true,
            time_limit: request.time_limit,
            deadline: None,
        })
    }

    fn wrap(&self, allocation: &Allocation, argv: Vec<String>) -> Vec<String> {
        let mut wrapped = vec![
            self.srun.to_string_lossy().into_owned(),
            format!("--jobid={}", allocation.id),
            "--ntasks=1".to_string(),
            // A reused allocation may outlive this launch's limit
            format!("--time={}", allocation.time_limit),
        ];
        wrapped.extend(argv);
        wrapped
    }

    async fn release(&self, allocation: &Allocation) -> Result<()> {
        if !allocation.owned {
            debug!("Leaving allocation {} to its owner", allocation.id);
            return Ok(());
        }

        let output = process::capture(Command::new(&self.scancel).arg(&allocation.id))
            .await
            .map_err(|e| {
                LaunchError::Scheduling(format!(
                    "failed to execute {}: {}",
                    self.scancel.display(),
                    e
                ))
            })?;

        if !output.success() {
            return Err(LaunchError::Scheduling(format!(
                "scancel {} exited with code {}: {}",
                allocation.id,
                output.code(),
                output.stderr.trim()
            )));
        }

        info!("Released Slurm allocation {}", allocation.id);
        Ok(())
    }
}

/// Renders a resource request as Slurm option flags
///
/// Shared by `salloc` and batch-script `#SBATCH` directives.
pub fn resource_flags(request: &ResourceRequest) -> Vec<String> {
    let mut flags = vec![
        format!("--job-name={}", request.job_name),
        format!("--mem-per-cpu={}", request.mem_per_cpu_mb),
    ];
    if let Some(accelerator) = &request.accelerator {
        flags.push(format!("--gres={}", accelerator));
    }
    flags.push(format!("--partition={}", request.partition));
    flags.push(format!("--time={}", request.time_limit));
    flags
}

/// Extracts the job id from salloc's "Granted job allocation <id>" line
pub fn parse_granted_allocation(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (_, rest) = line.split_once(GRANTED_MARKER)?;
        let id = rest.split_whitespace().next()?;
        id.chars()
            .all(|c| c.is_ascii_digit() || c == '_')
            .then(|| id.to_string())
    })
}
