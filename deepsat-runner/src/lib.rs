//! DeepSat Runner
//!
//! Launches the hyperspectral preprocessing program on a cluster.
//!
//! Architecture:
//! - Configuration: site settings from environment or defaults
//! - Scheduler: resource allocation and in-allocation execution (Slurm, local)
//! - Services: runtime environment preparation and usage reporting
//! - Launcher: the allocate, configure, invoke, report sequence
//! - Batch: the same launch rendered as an `sbatch` script

pub mod batch;
pub mod config;
pub mod error;
pub mod launcher;
pub mod process;
pub mod scheduler;
pub mod service;

#[cfg(test)]
mod test_support;

pub use config::{Program, RunnerConfig, SchedulerKind};
pub use error::{InvocationError, LaunchError};
pub use launcher::Launcher;
