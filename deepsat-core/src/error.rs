//! Configuration errors

use thiserror::Error;

/// Errors raised while building or validating launch parameters
///
/// These are always detected before the scheduler is contacted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required value is missing or empty
    #[error("'{0}' must not be empty")]
    EmptyField(&'static str),

    /// Unrecognized normalization method tag
    #[error("unknown normalize method '{0}' (expected one of: l2norm_along_channel, minmax_scaling)")]
    UnknownNormalizeMethod(String),

    /// Time limit not in HH:MM:SS form
    #[error("invalid time limit '{0}': expected HH:MM:SS")]
    InvalidTimeLimit(String),

    /// A numeric resource value is out of range
    #[error("invalid value for '{field}': {reason}")]
    InvalidResource {
        /// Name of the offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// Job file could not be read or parsed
    #[error("invalid job file: {0}")]
    JobFile(String),

    /// Runner settings (scheduler, program, modules) are invalid
    #[error("invalid runner settings: {0}")]
    Settings(String),
}
