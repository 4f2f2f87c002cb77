//! Job domain types
//!
//! A [`JobSpec`] holds the five values handed to the preprocessing program.
//! They are defined once at launch time and passed through unmodified.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

pub const SRC_FILE_NAME_ARG: &str = "--src_file_name";
pub const TGT_FILE_NAME_ARG: &str = "--tgt_file_name";
pub const METADATA_FILE_NAME_ARG: &str = "--metadata_file_name";
pub const NORMALIZE_METHOD_ARG: &str = "--normalize_method";
pub const FOREST_DATA_PATH_ARG: &str = "--forest_data_path";

/// Parameters of one preprocessing run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSpec {
    /// Identifies the input dataset
    pub src_file_name: String,
    /// Identifies the label dataset
    pub tgt_file_name: String,
    /// Identifies the auxiliary metadata
    pub metadata_file_name: String,
    pub normalize_method: NormalizeMethod,
    /// Path to the forest reference data header
    pub forest_data_path: PathBuf,
}

impl Default for JobSpec {
    fn default() -> Self {
        Self {
            src_file_name: "hyperspectral_src".to_string(),
            tgt_file_name: "hyperspectral_tgt".to_string(),
            metadata_file_name: "metadata".to_string(),
            normalize_method: NormalizeMethod::L2NormAlongChannel,
            forest_data_path: PathBuf::from("/proj/deepsat/hyperspectral/forestdata.hdr"),
        }
    }
}

impl JobSpec {
    /// Parses a job spec from JSON
    ///
    /// Fields absent from the document keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::JobFile(e.to_string()))
    }

    /// Validates that every value is non-empty
    ///
    /// Fields are checked in argument order, so a missing source file name
    /// is always the first error reported.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.src_file_name.trim().is_empty() {
            return Err(ConfigError::EmptyField("src_file_name"));
        }
        if self.tgt_file_name.trim().is_empty() {
            return Err(ConfigError::EmptyField("tgt_file_name"));
        }
        if self.metadata_file_name.trim().is_empty() {
            return Err(ConfigError::EmptyField("metadata_file_name"));
        }
        if self.forest_data_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyField("forest_data_path"));
        }
        Ok(())
    }

    /// Renders the named arguments passed to the preprocessing program
    ///
    /// Each flag and value is a separate argv entry; values are not altered.
    pub fn to_args(&self) -> Vec<String> {
        vec![
            SRC_FILE_NAME_ARG.to_string(),
            self.src_file_name.clone(),
            TGT_FILE_NAME_ARG.to_string(),
            self.tgt_file_name.clone(),
            METADATA_FILE_NAME_ARG.to_string(),
            self.metadata_file_name.clone(),
            NORMALIZE_METHOD_ARG.to_string(),
            self.normalize_method.as_str().to_string(),
            FOREST_DATA_PATH_ARG.to_string(),
            self.forest_data_path.to_string_lossy().into_owned(),
        ]
    }
}

/// Normalization applied to the source image by the preprocessing program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NormalizeMethod {
    /// L2 norm computed along the channel axis
    #[default]
    #[serde(rename = "l2norm_along_channel")]
    L2NormAlongChannel,
    /// Per-band min/max scaling
    #[serde(rename = "minmax_scaling")]
    MinMaxScaling,
}

impl NormalizeMethod {
    pub const ALL: [NormalizeMethod; 2] = [
        NormalizeMethod::L2NormAlongChannel,
        NormalizeMethod::MinMaxScaling,
    ];

    /// The tag passed on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            NormalizeMethod::L2NormAlongChannel => "l2norm_along_channel",
            NormalizeMethod::MinMaxScaling => "minmax_scaling",
        }
    }
}

impl fmt::Display for NormalizeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NormalizeMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownNormalizeMethod(s.to_string()))
    }
}
