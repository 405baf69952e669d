//! HTML report generation through the external `codereport` renderer.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{info, warn};

use tidypipe_core::diagnostic::{parse_diagnostics, read_warnings};
use tidypipe_core::report::{write_report_json, ReportBuilder, HTML_REPORT_DIRNAME, REPORT_FILENAME};
use tidypipe_core::{RunnerSettings, TidyError};

use crate::context::ExecutionContext;
use crate::error::{CiError, CiResult};
use crate::runner::{CommandSpec, ProcessRunner};
use crate::stage::{Stage, StageOutcome};

/// Renderer executable.
pub const DEFAULT_RENDERER: &str = "codereport";

/// Stderr the renderer prints when none of the reported files exist.
pub const RENDERER_BENIGN_STDERR: &str = "AssertionError: No existing files found";

/// Writes `report.json` and renders it into `html_report/`.
#[derive(Debug, Clone)]
pub struct HtmlReportStage {
    ignore: Vec<String>,
    exclude_paths: Vec<PathBuf>,
    build_dir: String,
    base_dir: PathBuf,
    renderer: String,
}

impl HtmlReportStage {
    pub fn new(build_dir: impl Into<String>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            ignore: Vec::new(),
            exclude_paths: Vec::new(),
            build_dir: build_dir.into(),
            base_dir: base_dir.into(),
            renderer: DEFAULT_RENDERER.to_string(),
        }
    }

    pub fn from_settings(settings: &RunnerSettings) -> Self {
        Self::new(settings.build_dir.clone(), settings.base_dir.clone())
            .with_ignore(settings.ignore_checks.clone())
            .with_exclude_paths(settings.resolved_exclude_paths())
    }

    /// Checks hidden from the report. A trailing `*` matches by prefix.
    pub fn with_ignore(mut self, ignore: Vec<String>) -> Self {
        self.ignore = ignore;
        self
    }

    /// Resolved trees hidden from the report.
    pub fn with_exclude_paths(mut self, exclude: Vec<PathBuf>) -> Self {
        self.exclude_paths = exclude;
        self
    }

    pub fn with_renderer(mut self, renderer: impl Into<String>) -> Self {
        self.renderer = renderer.into();
        self
    }

    fn render_command(&self) -> CommandSpec {
        CommandSpec::new(&self.renderer)
            .arg(REPORT_FILENAME)
            .arg(HTML_REPORT_DIRNAME)
            .arg(format!("--prefix={}", self.base_dir.display()))
            .benign_stderr(RENDERER_BENIGN_STDERR)
    }
}

#[async_trait]
impl Stage for HtmlReportStage {
    fn name(&self) -> &str {
        "make_html_report"
    }

    async fn execute(&self, ctx: &ExecutionContext) -> CiResult<StageOutcome> {
        let out = ctx.output_dir();
        let (_, text) = read_warnings(out)?;
        let diagnostics = parse_diagnostics(&text);

        let items = ReportBuilder::new()
            .with_ignore(self.ignore.clone())
            .with_exclude_paths(self.exclude_paths.clone(), ctx.build_path(&self.build_dir))
            .build(&diagnostics);
        write_report_json(&out.join(REPORT_FILENAME), &items)?;
        info!(items = items.len(), total = diagnostics.len(), "report document written");

        if items.is_empty() {
            ctx.log().line("No issue found");
            return Ok(StageOutcome::Passed);
        }

        let html_dir = out.join(HTML_REPORT_DIRNAME);
        if html_dir.is_dir() {
            std::fs::remove_dir_all(&html_dir).map_err(|e| TidyError::file_io(&html_dir, e))?;
        }

        let spec = self.render_command().current_dir(out);
        let result = match ProcessRunner::run(&spec, ctx.log(), None).await {
            Ok(result) => result,
            Err(e @ CiError::Spawn { .. }) if e.is_not_found() => {
                warn!(renderer = %self.renderer, "report renderer not installed");
                ctx.log().line(format!(
                    "Please run `pip install {}` to install this optional dependency for this feature",
                    DEFAULT_RENDERER
                ));
                return Ok(StageOutcome::skipped(format!("{} not installed", self.renderer)));
            }
            Err(e) => return Err(e),
        };

        if result.known_issue {
            ctx.log().line("No issue found");
        } else {
            ctx.log().line(format!(
                "Please open {}/{}/index.html to view the report",
                out.display(),
                HTML_REPORT_DIRNAME
            ));
        }
        Ok(StageOutcome::Passed)
    }
}
