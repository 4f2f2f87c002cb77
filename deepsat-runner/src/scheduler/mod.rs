//! Scheduler layer for the runner
//!
//! A scheduler grants an allocation for a resource request, wraps the
//! program's argv so it runs inside that allocation, and releases the
//! allocation afterwards.
//!
//! Schedulers are trait objects so the launcher can be exercised without a
//! real cluster.

pub mod local;
pub mod slurm;

pub use local::LocalScheduler;
pub use slurm::SlurmScheduler;

use async_trait::async_trait;
use deepsat_core::domain::resources::{ResourceRequest, TimeLimit};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{RunnerConfig, SchedulerKind};
use crate::error::Result;

/// A granted execution slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// Scheduler job id
    pub id: String,

    /// Whether this launch requested the allocation and must release it
    pub owned: bool,

    /// Wall-clock limit requested for this launch
    pub time_limit: TimeLimit,

    /// Time limit the launcher enforces itself (None = scheduler enforces)
    pub deadline: Option<Duration>,
}

/// Service trait for resource allocation and in-allocation execution
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Requests an execution slot
    ///
    /// Fails with `LaunchError::Scheduling` if the request is not granted.
    async fn allocate(&self, request: &ResourceRequest) -> Result<Allocation>;

    /// Wraps a program argv so it runs inside the allocation
    fn wrap(&self, allocation: &Allocation, argv: Vec<String>) -> Vec<String>;

    /// Releases an allocation obtained from `allocate`
    async fn release(&self, allocation: &Allocation) -> Result<()>;
}

/// Builds the scheduler selected by the configuration
pub fn create_scheduler(config: &RunnerConfig) -> Arc<dyn Scheduler> {
    match config.scheduler {
        SchedulerKind::Slurm => Arc::new(SlurmScheduler::from_config(config)),
        SchedulerKind::Local => Arc::new(LocalScheduler::new()),
    }
}
