//! Domain-level error taxonomy for tidypipe.

use std::path::PathBuf;

/// tidypipe domain errors.
#[derive(Debug, thiserror::Error)]
pub enum TidyError {
    #[error("{} not found. {hint}", path.display())]
    MissingInput { path: PathBuf, hint: String },

    #[error("malformed compile database {}: {source}", path.display())]
    CompileDatabase {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("analysis tool did not report its enabled checks, first line was: {first_line:?}")]
    MissingBanner { first_line: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("io error on {}: {source}", path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TidyError {
    /// Attach a path to an I/O failure.
    pub fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileIo {
            path: path.into(),
            source,
        }
    }
}

/// Result type for tidypipe domain operations.
pub type Result<T> = std::result::Result<T, TidyError>;
