//! Local scheduler
//!
//! Runs the program directly on this host. Memory, accelerator and partition
//! requests are advisory; the time limit is returned as the allocation
//! deadline and enforced by the launcher.

use async_trait::async_trait;
use deepsat_core::domain::resources::ResourceRequest;
use tracing::{debug, info};
use uuid::Uuid;

use super::{Allocation, Scheduler};
use crate::error::Result;

/// Scheduler backed by the local host
#[derive(Debug, Default)]
pub struct LocalScheduler {}

impl LocalScheduler {
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait]
impl Scheduler for LocalScheduler {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn allocate(&self, request: &ResourceRequest) -> Result<Allocation> {
        debug!(
            "Local run ignores mem_per_cpu={}MB accelerator={:?} partition={}",
            request.mem_per_cpu_mb, request.accelerator, request.partition
        );

        let allocation = Allocation {
            id: format!("local-{}", Uuid::new_v4()),
            owned: true,
            time_limit: request.time_limit,
            deadline: Some(request.time_limit.as_duration()),
        };
        info!(
            "Allocated {} (time limit {})",
            allocation.id, request.time_limit
        );
        Ok(allocation)
    }

    fn wrap(&self, _allocation: &Allocation, argv: Vec<String>) -> Vec<String> {
        argv
    }

    async fn release(&self, allocation: &Allocation) -> Result<()> {
        debug!("Released {}", allocation.id);
        Ok(())
    }
}
