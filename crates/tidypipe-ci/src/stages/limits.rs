//! Per-check budget enforcement.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{info, warn};

use tidypipe_core::diagnostic::{parse_diagnostics, read_warnings};
use tidypipe_core::{LimitBudget, LimitEnforcer, RunnerSettings};

use crate::context::ExecutionContext;
use crate::error::CiResult;
use crate::stage::{Stage, StageOutcome};

/// Fails the run when any budgeted check is reported more often than allowed.
#[derive(Debug, Clone)]
pub struct LimitsStage {
    budget: LimitBudget,
    exclude_paths: Vec<PathBuf>,
    build_dir: String,
}

impl LimitsStage {
    /// `exclude_paths` must already be resolved.
    pub fn new(budget: LimitBudget, exclude_paths: Vec<PathBuf>, build_dir: impl Into<String>) -> Self {
        Self {
            budget,
            exclude_paths,
            build_dir: build_dir.into(),
        }
    }

    pub fn from_settings(settings: &RunnerSettings) -> Self {
        Self::new(
            settings.limits.clone(),
            settings.resolved_exclude_paths(),
            settings.build_dir.clone(),
        )
    }
}

#[async_trait]
impl Stage for LimitsStage {
    fn name(&self) -> &str {
        "check_limits"
    }

    async fn execute(&self, ctx: &ExecutionContext) -> CiResult<StageOutcome> {
        if self.budget.is_empty() {
            return Ok(StageOutcome::skipped("no limits configured"));
        }

        let (_, text) = read_warnings(ctx.output_dir())?;
        let diagnostics = parse_diagnostics(&text);

        // diagnostics name paths relative to the directory the tool ran in
        let enforcer = LimitEnforcer::new(
            self.budget.clone(),
            self.exclude_paths.clone(),
            ctx.build_path(&self.build_dir),
        );
        let report = enforcer.evaluate(&diagnostics);
        ctx.log().write_str(&report.render());

        if report.passed() {
            info!(checks = report.tallies.len(), "all checks within limits");
            return Ok(StageOutcome::Passed);
        }

        let reason = report
            .violations()
            .map(|t| t.summary_line())
            .collect::<Vec<_>>()
            .join("; ");
        warn!(%reason, "check limits exceeded");
        Ok(StageOutcome::failed(reason))
    }
}
