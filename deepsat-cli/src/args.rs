//! Job and resource flags
//!
//! Every flag is optional. Unset flags fall back to the job file (if given)
//! and then to the built-in defaults.

use anyhow::Result;
use clap::Args;
use deepsat_core::ConfigError;
use deepsat_core::domain::job::{JobSpec, NormalizeMethod};
use deepsat_core::domain::resources::{Accelerator, ResourceRequest, TimeLimit};
use std::path::PathBuf;

/// Values passed to the preprocessing program
#[derive(Args, Debug, Default)]
pub struct JobArgs {
    /// JSON file with job values; flags override its fields
    #[arg(long, env = "DEEPSAT_JOB_FILE")]
    pub job_file: Option<PathBuf>,

    /// Input dataset name
    #[arg(long, visible_alias = "src_file_name")]
    pub src_file_name: Option<String>,

    /// Label dataset name
    #[arg(long, visible_alias = "tgt_file_name")]
    pub tgt_file_name: Option<String>,

    /// Metadata file name
    #[arg(long, visible_alias = "metadata_file_name")]
    pub metadata_file_name: Option<String>,

    /// Input normalization: l2norm_along_channel or minmax_scaling
    #[arg(long, visible_alias = "normalize_method", value_parser = parse_normalize_method)]
    pub normalize_method: Option<NormalizeMethod>,

    /// Path to the forest reference data header
    #[arg(long, visible_alias = "forest_data_path")]
    pub forest_data_path: Option<PathBuf>,
}

impl JobArgs {
    /// Builds the job spec: defaults, then job file, then flags
    pub fn into_job_spec(self) -> Result<JobSpec> {
        let mut job = match &self.job_file {
            Some(path) => {
                let json = std::fs::read_to_string(path).map_err(|e| {
                    ConfigError::JobFile(format!("cannot read {}: {}", path.display(), e))
                })?;
                JobSpec::from_json(&json)?
            }
            None => JobSpec::default(),
        };

        if let Some(value) = self.src_file_name {
            job.src_file_name = value;
        }
        if let Some(value) = self.tgt_file_name {
            job.tgt_file_name = value;
        }
        if let Some(value) = self.metadata_file_name {
            job.metadata_file_name = value;
        }
        if let Some(value) = self.normalize_method {
            job.normalize_method = value;
        }
        if let Some(value) = self.forest_data_path {
            job.forest_data_path = value;
        }

        Ok(job)
    }
}

/// Resources requested from the scheduler
#[derive(Args, Debug, Default)]
pub struct ResourceArgs {
    /// Job name shown by the scheduler
    #[arg(long)]
    pub job_name: Option<String>,

    /// Memory per CPU in megabytes
    #[arg(long)]
    pub mem_per_cpu: Option<u64>,

    /// GPU model, e.g. k80
    #[arg(long)]
    pub gpu_type: Option<String>,

    /// Number of GPUs (0 for a CPU-only job)
    #[arg(long)]
    pub gpus: Option<u32>,

    /// Partition/queue name
    #[arg(short, long)]
    pub partition: Option<String>,

    /// Wall-clock time limit, HH:MM:SS
    #[arg(short, long, value_parser = parse_time_limit)]
    pub time: Option<TimeLimit>,
}

impl ResourceArgs {
    pub fn into_request(self) -> ResourceRequest {
        let mut request = ResourceRequest::default();

        if let Some(value) = self.job_name {
            request.job_name = value;
        }
        if let Some(value) = self.mem_per_cpu {
            request.mem_per_cpu_mb = value;
        }

        request.accelerator = match (request.accelerator, self.gpus, self.gpu_type) {
            (_, Some(0), _) => None,
            (Some(mut accelerator), count, model) => {
                if let Some(count) = count {
                    accelerator.count = count;
                }
                if model.is_some() {
                    accelerator.model = model;
                }
                Some(accelerator)
            }
            (None, None, None) => None,
            (None, count, model) => Some(Accelerator {
                model,
                count: count.unwrap_or(1),
            }),
        };

        if let Some(value) = self.partition {
            request.partition = value;
        }
        if let Some(value) = self.time {
            request.time_limit = value;
        }

        request
    }
}

fn parse_normalize_method(value: &str) -> Result<NormalizeMethod, ConfigError> {
    value.parse()
}

fn parse_time_limit(value: &str) -> Result<TimeLimit, ConfigError> {
    value.parse()
}
