//! The stage abstraction the pipeline sequences.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::ExecutionContext;
use crate::error::CiResult;

/// How a stage finished when it did not error out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    /// Work done.
    Passed,

    /// Nothing to do, or an optional feature is unavailable. The run continues.
    Skipped { reason: String },

    /// An expected failure such as an exceeded budget. The run stops with a failing result.
    Failed { reason: String },
}

impl StageOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StageOutcome::Passed => "passed",
            StageOutcome::Skipped { .. } => "skipped",
            StageOutcome::Failed { .. } => "failed",
        }
    }

    /// Whether the pipeline stops after this outcome.
    pub fn halts_run(&self) -> bool {
        matches!(self, StageOutcome::Failed { .. })
    }
}

/// A named unit of work run once per input directory.
///
/// Stages never hold state across directories: whatever a stage produces
/// lives on disk and the next stage reads it back.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stable identifier used in logs and results.
    fn name(&self) -> &str;

    /// Run against one directory. `Err` aborts the whole run.
    async fn execute(&self, ctx: &ExecutionContext) -> CiResult<StageOutcome>;
}
