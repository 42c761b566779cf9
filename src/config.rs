use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 100_000;
pub const DEFAULT_MAJORITY_RATIO: usize = 5;
pub const DEFAULT_SAMPLE_SIZE: usize = 500_000;
pub const DEFAULT_RANDOM_SEED: u64 = 42;

/// Header names of the six columns materialized per row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ColumnNames {
    pub state: String,
    pub lga: String,
    pub gender: String,
    pub class: String,
    pub date: String,
    pub status: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            state: "state".to_string(),
            lga: "lga".to_string(),
            gender: "gender".to_string(),
            class: "class".to_string(),
            date: "date".to_string(),
            status: "attendance_status".to_string(),
        }
    }
}

impl ColumnNames {
    /// Columns in the order [`crate::models::RawRow`] stores them.
    pub fn ordered(&self) -> [&str; 6] {
        [
            self.state.as_str(),
            self.lga.as_str(),
            self.gender.as_str(),
            self.class.as_str(),
            self.date.as_str(),
            self.status.as_str(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Rows decoded per batch.
    pub chunk_size: usize,
    /// Majority rows kept per minority row, per batch.
    pub majority_ratio: usize,
    /// Hard cap on the final sample.
    pub sample_size: usize,
    pub random_seed: u64,
    /// Read `03/04/2024` as 3 April instead of 4 March.
    pub day_first: bool,
    /// Count data rows before streaming so progress has a denominator.
    pub count_rows: bool,
    /// Depth of the validated-batch queue; 0 decodes on the calling thread.
    pub prefetch_batches: usize,
    pub member_extension: String,
    pub columns: ColumnNames,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            majority_ratio: DEFAULT_MAJORITY_RATIO,
            sample_size: DEFAULT_SAMPLE_SIZE,
            random_seed: DEFAULT_RANDOM_SEED,
            day_first: false,
            count_rows: false,
            prefetch_batches: 0,
            member_extension: "csv".to_string(),
            columns: ColumnNames::default(),
        }
    }
}

impl SamplingConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            PipelineError::Configuration(format!("cannot read {}: {err}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|err| {
            PipelineError::Configuration(format!("cannot parse {}: {err}", path.display()))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(PipelineError::Configuration(
                "chunk_size must be positive".to_string(),
            ));
        }
        if self.sample_size == 0 {
            return Err(PipelineError::Configuration(
                "sample_size must be positive".to_string(),
            ));
        }
        if self.majority_ratio == 0 {
            return Err(PipelineError::Configuration(
                "majority_ratio must be positive".to_string(),
            ));
        }
        if self.member_extension.trim().is_empty() {
            return Err(PipelineError::Configuration(
                "member_extension must not be empty".to_string(),
            ));
        }
        for name in self.columns.ordered() {
            if name.trim().is_empty() {
                return Err(PipelineError::Configuration(
                    "column names must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
