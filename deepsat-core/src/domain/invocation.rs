//! Invocation records
//!
//! Runtime record of one execution of the preprocessing program, handed to
//! usage reporters after the process finishes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What happened to the invoked process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationRecord {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Exit code, None when the process was killed by a signal or timed out
    pub exit_code: Option<i32>,
}

impl InvocationRecord {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Wall-clock time between start and finish
    pub fn elapsed(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}

/// Result of a successful launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchOutcome {
    /// Scheduler job id of the allocation the program ran in
    pub allocation_id: String,
    pub record: InvocationRecord,
}
