//! Resource request types
//!
//! Describes what the launch asks of the scheduler. The values are consumed by
//! the scheduler; the launcher itself only validates and forwards them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Resources requested for one launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    /// Name the scheduler shows for the job
    pub job_name: String,

    /// Memory per allocated CPU, in megabytes
    pub mem_per_cpu_mb: u64,

    /// Requested accelerators (None = CPU only)
    pub accelerator: Option<Accelerator>,

    /// Partition/queue to run in
    pub partition: String,

    /// Wall-clock limit, enforced by the scheduler
    pub time_limit: TimeLimit,
}

impl Default for ResourceRequest {
    fn default() -> Self {
        Self {
            job_name: "deepsat-preprocess".to_string(),
            mem_per_cpu_mb: 8000,
            accelerator: Some(Accelerator {
                model: Some("k80".to_string()),
                count: 1,
            }),
            partition: "gpu".to_string(),
            time_limit: TimeLimit::from_hms(0, 30, 0),
        }
    }
}

impl ResourceRequest {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.job_name.trim().is_empty() {
            return Err(ConfigError::EmptyField("job_name"));
        }
        if self.mem_per_cpu_mb == 0 {
            return Err(ConfigError::InvalidResource {
                field: "mem_per_cpu",
                reason: "must be greater than 0".to_string(),
            });
        }
        if let Some(accelerator) = &self.accelerator {
            if accelerator.count == 0 {
                return Err(ConfigError::InvalidResource {
                    field: "gpus",
                    reason: "must be greater than 0 when an accelerator is requested"
                        .to_string(),
                });
            }
            if accelerator.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
                return Err(ConfigError::EmptyField("gpu_type"));
            }
        }
        if self.partition.trim().is_empty() {
            return Err(ConfigError::EmptyField("partition"));
        }
        Ok(())
    }
}

/// A generic GPU resource request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accelerator {
    /// GPU model (e.g. "k80"), None for any model
    pub model: Option<String>,
    pub count: u32,
}

impl fmt::Display for Accelerator {
    /// Formats as a generic resource string, e.g. `gpu:k80:1`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.model {
            Some(model) => write!(f, "gpu:{}:{}", model, self.count),
            None => write!(f, "gpu:{}", self.count),
        }
    }
}

/// Wall-clock time limit in `HH:MM:SS` form
///
/// Hours may exceed 23; a zero limit is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeLimit {
    seconds: u64,
}

impl TimeLimit {
    pub const fn from_hms(hours: u64, minutes: u64, seconds: u64) -> Self {
        Self {
            seconds: hours * 3600 + minutes * 60 + seconds,
        }
    }

    /// Like `from_hms`, but `None` when the total overflows
    pub fn checked_from_hms(hours: u64, minutes: u64, seconds: u64) -> Option<Self> {
        let seconds = hours
            .checked_mul(3600)?
            .checked_add(minutes.checked_mul(60)?)?
            .checked_add(seconds)?;
        Some(Self { seconds })
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.seconds)
    }
}

impl fmt::Display for TimeLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.seconds / 3600;
        let minutes = (self.seconds % 3600) / 60;
        let seconds = self.seconds % 60;
        write!(f, "{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}

impl FromStr for TimeLimit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidTimeLimit(s.to_string());

        let parts: Vec<&str> = s.trim().split(':').collect();
        let [hours, minutes, seconds] = parts.as_slice() else {
            return Err(invalid());
        };

        let parse = |part: &str| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse::<u64>().map_err(|_| invalid())
        };

        let (hours, minutes, seconds) = (parse(*hours)?, parse(*minutes)?, parse(*seconds)?);
        if minutes >= 60 || seconds >= 60 {
            return Err(invalid());
        }

        let limit = TimeLimit::checked_from_hms(hours, minutes, seconds).ok_or_else(invalid)?;
        if limit.seconds == 0 {
            return Err(invalid());
        }
        Ok(limit)
    }
}

impl TryFrom<String> for TimeLimit {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeLimit> for String {
    fn from(limit: TimeLimit) -> Self {
        limit.to_string()
    }
}
