//! Runs the clang-tidy driver script and captures its diagnostics.

use async_trait::async_trait;
use tracing::info;

use tidypipe_core::diagnostic::{check_banner, read_text_lossy, warnings_path};
use tidypipe_core::RunnerSettings;

use crate::context::ExecutionContext;
use crate::error::CiResult;
use crate::runner::{CommandSpec, ExitPolicy, ProcessRunner};
use crate::stage::{Stage, StageOutcome};

/// Runs the analysis in `<input>/<build_dir>` and writes stdout to
/// `<output>/warnings.txt`. Stderr (progress output) goes to the log.
#[derive(Debug, Clone)]
pub struct AnalysisStage {
    build_dir: String,
    spec: CommandSpec,
}

impl AnalysisStage {
    /// Analysis with an arbitrary command whose stdout is the diagnostics document.
    pub fn new(build_dir: impl Into<String>, spec: CommandSpec) -> Self {
        Self {
            build_dir: build_dir.into(),
            spec,
        }
    }

    /// `<python> <run-clang-tidy.py> <regexes...> <extra args>`.
    ///
    /// Findings make the tool exit non-zero; that only fails the run when
    /// `reflect_findings` is set.
    pub fn from_settings(settings: &RunnerSettings) -> Self {
        let line = format!(
            "{} {} {} {}",
            settings.python,
            settings.run_clang_tidy_py,
            settings.check_files_regex.join(" "),
            settings.clang_extra_args
        );
        let accepted = if settings.reflect_findings {
            ExitPolicy::default()
        } else {
            ExitPolicy::Any
        };
        Self::new(settings.build_dir.clone(), CommandSpec::shell(line.trim_end()).accept(accepted))
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }
}

#[async_trait]
impl Stage for AnalysisStage {
    fn name(&self) -> &str {
        "run_clang_tidy"
    }

    async fn execute(&self, ctx: &ExecutionContext) -> CiResult<StageOutcome> {
        let out = warnings_path(ctx.output_dir());
        let spec = self.spec.clone().current_dir(ctx.build_path(&self.build_dir));
        info!(stage = "run_clang_tidy", command = %spec.display(), "running analysis");

        let result = ProcessRunner::run(&spec, ctx.log(), Some(&out)).await?;

        let text = read_text_lossy(&out)?;
        check_banner(&text)?;

        info!(exit_code = result.exit_code, duration_ms = result.duration_ms, "analysis finished");
        ctx.log()
            .line(format!("clang-tidy report generated: {}", out.display()));
        Ok(StageOutcome::Passed)
    }
}
