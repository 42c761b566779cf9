use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Pipeline stage an I/O or decode failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Archive,
    Count,
    Decode,
    Prefetch,
    Export,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Archive => "archive",
            Stage::Count => "row count",
            Stage::Decode => "decode",
            Stage::Prefetch => "prefetch",
            Stage::Export => "export",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("archive not found: {}", path.display())]
    ArchiveNotFound { path: PathBuf },

    #[error("no `.{extension}` member inside {}", path.display())]
    NoTabularMember { path: PathBuf, extension: String },

    #[error("column `{column}` missing from header of {member}")]
    MissingColumn { column: String, member: String },

    #[error("no usable rows after validation and balancing ({rows_read} read, {rows_rejected} rejected)")]
    EmptyDataset { rows_read: u64, rows_rejected: u64 },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("{stage} stage I/O failure: {source}")]
    Io {
        stage: Stage,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} stage CSV failure: {source}")]
    Csv {
        stage: Stage,
        #[source]
        source: csv::Error,
    },

    #[error("unreadable archive {}: {source}", path.display())]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

impl PipelineError {
    pub fn io(stage: Stage, source: std::io::Error) -> Self {
        PipelineError::Io { stage, source }
    }

    pub fn csv(stage: Stage, source: csv::Error) -> Self {
        PipelineError::Csv { stage, source }
    }
}
