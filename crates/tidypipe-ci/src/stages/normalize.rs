//! Rewrites diagnostic paths relative to the base directory.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use tidypipe_core::diagnostic::require_warnings;
use tidypipe_core::PathNormalizer;

use crate::context::ExecutionContext;
use crate::error::CiResult;
use crate::stage::{Stage, StageOutcome};

/// Rewrites `warnings.txt` in place so every diagnostic path is relative to
/// the base directory.
#[derive(Debug, Clone)]
pub struct NormalizeStage {
    base_dir: PathBuf,
}

impl NormalizeStage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

#[async_trait]
impl Stage for NormalizeStage {
    fn name(&self) -> &str {
        "normalize_output_path"
    }

    async fn execute(&self, ctx: &ExecutionContext) -> CiResult<StageOutcome> {
        let path = require_warnings(ctx.output_dir())?;
        let rewritten = PathNormalizer::new(self.base_dir.clone()).normalize_file(&path)?;

        info!(path = %path.display(), rewritten, "diagnostic paths normalized");
        ctx.log().line(format!("Normalized file {}", path.display()));
        Ok(StageOutcome::Passed)
    }
}
