//! Error types for launching jobs

use deepsat_core::ConfigError;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for launcher operations
pub type Result<T> = std::result::Result<T, LaunchError>;

pub const CONFIG_EXIT_CODE: i32 = 2;
pub const SCHEDULING_EXIT_CODE: i32 = 3;
pub const ENVIRONMENT_EXIT_CODE: i32 = 4;
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Errors that end a launch
///
/// None of these are retried; they propagate to the caller, which reports
/// the job as failed.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Job or resource parameters are invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The scheduler did not grant the resource request
    #[error("scheduling error: {0}")]
    Scheduling(String),

    /// The runtime environment could not be prepared
    #[error("environment setup error: {0}")]
    EnvironmentSetup(String),

    /// The program could not be started or did not succeed
    #[error("invocation error: {0}")]
    Invocation(#[from] InvocationError),
}

impl LaunchError {
    /// Process exit code the CLI reports for this error
    ///
    /// A program that exited non-zero passes its own code through.
    pub fn exit_code(&self) -> i32 {
        match self {
            LaunchError::Config(_) => CONFIG_EXIT_CODE,
            LaunchError::Scheduling(_) => SCHEDULING_EXIT_CODE,
            LaunchError::EnvironmentSetup(_) => ENVIRONMENT_EXIT_CODE,
            LaunchError::Invocation(InvocationError::ExitStatus(code)) => *code,
            LaunchError::Invocation(InvocationError::TimedOut(_)) => TIMEOUT_EXIT_CODE,
            LaunchError::Invocation(_) => 1,
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Failures of the invoked program itself
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for program: {0}")]
    Wait(#[source] std::io::Error),

    #[error("program exited with status {0}")]
    ExitStatus(i32),

    #[error("program was terminated by a signal")]
    Signaled,

    #[error("program exceeded its time limit of {0:?}")]
    TimedOut(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_passes_program_status_through() {
        let err = LaunchError::from(InvocationError::ExitStatus(7));
        assert_eq!(err.exit_code(), 7);

        let err = LaunchError::from(InvocationError::TimedOut(Duration::from_secs(1)));
        assert_eq!(err.exit_code(), 124);
    }

    #[test]
    fn test_exit_code_per_category() {
        assert_eq!(
            LaunchError::from(ConfigError::EmptyField("src_file_name")).exit_code(),
            2
        );
        assert_eq!(LaunchError::Scheduling("denied".into()).exit_code(), 3);
        assert_eq!(LaunchError::EnvironmentSetup("missing".into()).exit_code(), 4);
        assert_eq!(LaunchError::Invocation(InvocationError::Signaled).exit_code(), 1);
    }

    #[test]
    fn test_messages_name_the_category() {
        let err = LaunchError::from(ConfigError::EmptyField("src_file_name"));
        assert_eq!(
            err.to_string(),
            "configuration error: 'src_file_name' must not be empty"
        );
        assert!(err.is_config());
    }
}
