//! Usage reporting service
//!
//! Emits post-run resource-usage statistics. Reporting is observational:
//! the launcher logs reporter failures and carries on.

use anyhow::{Context, Result};
use async_trait::async_trait;
use deepsat_core::domain::invocation::InvocationRecord;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::info;

use crate::process;
use crate::scheduler::Allocation;

/// Service trait for post-run usage reports
#[async_trait]
pub trait UsageReporter: Send + Sync {
    async fn report(&self, allocation: &Allocation, record: &InvocationRecord) -> Result<()>;
}

/// Reports Slurm job efficiency through `seff`
pub struct SeffReporter {
    seff: PathBuf,
}

impl SeffReporter {
    pub fn new(seff: PathBuf) -> Self {
        Self { seff }
    }
}

#[async_trait]
impl UsageReporter for SeffReporter {
    async fn report(&self, allocation: &Allocation, _record: &InvocationRecord) -> Result<()> {
        let output = process::capture(Command::new(&self.seff).arg(&allocation.id))
            .await
            .with_context(|| format!("Failed to execute {}", self.seff.display()))?;

        if !output.success() {
            anyhow::bail!(
                "seff {} exited with code {}: {}",
                allocation.id,
                output.code(),
                output.stderr.trim()
            );
        }

        for line in output.stdout.lines().filter(|l| !l.trim().is_empty()) {
            info!("{}", line);
        }
        Ok(())
    }
}

/// Logs a one-line summary of the run
#[derive(Debug, Default)]
pub struct SummaryReporter {}

#[async_trait]
impl UsageReporter for SummaryReporter {
    async fn report(&self, allocation: &Allocation, record: &InvocationRecord) -> Result<()> {
        let exit = record
            .exit_code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "none".to_string());
        info!(
            "Job {}: exit code {}, elapsed {:?}",
            allocation.id,
            exit,
            record.elapsed()
        );
        Ok(())
    }
}

/// Reporting disabled
#[derive(Debug, Default)]
pub struct NoopReporter {}

#[async_trait]
impl UsageReporter for NoopReporter {
    async fn report(&self, _allocation: &Allocation, _record: &InvocationRecord) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use deepsat_core::domain::resources::TimeLimit;

    fn fixture() -> (Allocation, InvocationRecord) {
        let now = Utc::now();
        (
            Allocation {
                id: "4242".to_string(),
                owned: true,
                time_limit: TimeLimit::from_hms(0, 30, 0),
                deadline: None,
            },
            InvocationRecord {
                started_at: now,
                finished_at: now,
                exit_code: Some(0),
            },
        )
    }

    #[tokio::test]
    async fn test_missing_seff_is_an_error() {
        let (allocation, record) = fixture();
        let reporter = SeffReporter::new(PathBuf::from("/nonexistent/slurm/bin/seff"));
        assert!(reporter.report(&allocation, &record).await.is_err());
    }

    #[tokio::test]
    async fn test_summary_and_noop_never_fail() {
        let (allocation, record) = fixture();
        assert!(SummaryReporter::default().report(&allocation, &record).await.is_ok());
        assert!(NoopReporter::default().report(&allocation, &record).await.is_ok());
    }
}
