//! Error types for stage execution and pipeline runs.

use std::path::PathBuf;

use thiserror::Error;
use tidypipe_core::TidyError;

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum CiError {
    /// Bubbled-up domain error (missing input, malformed database, missing banner).
    #[error(transparent)]
    Domain(#[from] TidyError),

    /// An external process could not be started.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// An external process exited with a code outside the accepted set.
    #[error("`{command}` exited with code {code}")]
    UnexpectedExit { command: String, code: i32 },

    /// A stage aborted the run.
    #[error("stage '{stage}' failed in {}: {source}", dir.display())]
    Stage {
        stage: String,
        dir: PathBuf,
        #[source]
        source: Box<CiError>,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CiError {
    /// True when the error means the program is not installed.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CiError::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Convenience result alias.
pub type CiResult<T> = std::result::Result<T, CiError>;
