//! Pipeline orchestration: an ordered stage list run once per input directory.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, Instrument};
use uuid::Uuid;

use tidypipe_core::obs::{
    emit_directory_entered, emit_run_finished, emit_run_started, emit_stage_finished, run_span,
};
use tidypipe_core::TidyError;

use crate::context::{dir_basename, ExecutionContext, LogSink};
use crate::error::{CiError, CiResult};
use crate::stage::{Stage, StageOutcome};

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Executing { dir: PathBuf },
    /// Every directory went through every stage.
    Done,
    /// A stage returned [`StageOutcome::Failed`].
    Halted { dir: PathBuf, stage: String },
}

/// One stage's outcome for one directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRecord {
    pub stage: String,
    pub outcome: StageOutcome,
    pub duration_ms: u64,
}

/// Stage outcomes for one input directory, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryResult {
    pub dir: PathBuf,
    pub output_dir: PathBuf,
    pub stages: Vec<StageRecord>,
}

impl DirectoryResult {
    pub fn passed(&self) -> bool {
        !self.stages.iter().any(|s| s.outcome.halts_run())
    }
}

/// Result of a run that was not aborted by an error.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub run_id: String,

    /// No stage failed.
    pub success: bool,

    /// Directories processed, in order. A halted run stops at the failing directory.
    pub directories: Vec<DirectoryResult>,

    pub duration_ms: u64,

    pub final_state: RunState,
}

impl PipelineResult {
    fn records(&self) -> impl Iterator<Item = &StageRecord> {
        self.directories.iter().flat_map(|d| d.stages.iter())
    }

    pub fn passed_count(&self) -> usize {
        self.records()
            .filter(|r| r.outcome == StageOutcome::Passed)
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.records()
            .filter(|r| matches!(r.outcome, StageOutcome::Skipped { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.records().filter(|r| r.outcome.halts_run()).count()
    }

    /// Process exit status for this result.
    pub fn exit_code(&self) -> i32 {
        if self.success {
            0
        } else {
            1
        }
    }
}

/// Registers directories and stages; registration order is execution order.
#[derive(Default)]
pub struct PipelineBuilder {
    dirs: Vec<PathBuf>,
    output_root: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    stages: Vec<Box<dyn Stage>>,
}

impl PipelineBuilder {
    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dirs.push(dir.into());
        self
    }

    pub fn dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.dirs.extend(dirs.into_iter().map(Into::into));
        self
    }

    /// Per-directory outputs go to `<root>/<dir basename>`; otherwise into the directory itself.
    pub fn output_root(mut self, root: Option<PathBuf>) -> Self {
        self.output_root = root;
        self
    }

    /// One log file per directory under `dir`; stdout otherwise.
    pub fn log_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.log_dir = dir;
        self
    }

    pub fn stage<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn boxed_stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            dirs: self.dirs,
            output_root: self.output_root,
            log_dir: self.log_dir,
            stages: self.stages,
        }
    }
}

/// Runs its stages strictly in order, one directory at a time.
pub struct Pipeline {
    dirs: Vec<PathBuf>,
    output_root: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    stages: Vec<Box<dyn Stage>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("dirs", &self.dirs)
            .field("output_root", &self.output_root)
            .field("log_dir", &self.log_dir)
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Run every stage against every directory.
    ///
    /// A [`StageOutcome::Failed`] stops the run with `success == false`. A
    /// stage error stops it with [`CiError::Stage`].
    pub async fn run(&self) -> CiResult<PipelineResult> {
        self.run_stages(0).await
    }

    /// Resume at the named stage, skipping the ones registered before it.
    pub async fn run_from(&self, stage: &str) -> CiResult<PipelineResult> {
        let start = self
            .stages
            .iter()
            .position(|s| s.name() == stage)
            .ok_or_else(|| TidyError::InvalidConfig(format!("unknown stage '{}'", stage)))?;
        self.run_stages(start).await
    }

    async fn run_stages(&self, start: usize) -> CiResult<PipelineResult> {
        let run_id = Uuid::new_v4().to_string();
        let span = run_span(&run_id);
        self.execute(run_id, start).instrument(span).await
    }

    fn output_dir_for(&self, dir: &Path) -> CiResult<PathBuf> {
        match &self.output_root {
            Some(root) => {
                let out = root.join(dir_basename(dir));
                std::fs::create_dir_all(&out).map_err(|e| TidyError::file_io(&out, e))?;
                Ok(out)
            }
            None => Ok(dir.to_path_buf()),
        }
    }

    async fn execute(&self, run_id: String, start: usize) -> CiResult<PipelineResult> {
        let started = Instant::now();
        let stages = &self.stages[start..];
        emit_run_started(&run_id, self.dirs.len(), stages.len());

        let mut state = RunState::Idle;
        let mut directories = Vec::with_capacity(self.dirs.len());

        for dir in &self.dirs {
            state = RunState::Executing { dir: dir.clone() };
            debug!(?state, "run state changed");

            let log = LogSink::for_directory(self.log_dir.as_deref(), dir)?;
            let output_dir = self.output_dir_for(dir)?;
            emit_directory_entered(&dir.to_string_lossy(), &output_dir.to_string_lossy());
            let ctx = ExecutionContext::new(dir, &output_dir, log);

            let mut records = Vec::with_capacity(stages.len());
            let mut halted_at = None;

            for stage in stages {
                let stage_start = Instant::now();
                info!(stage = stage.name(), dir = %dir.display(), "stage started");

                let outcome = match stage.execute(&ctx).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        let duration_ms = stage_start.elapsed().as_millis() as u64;
                        emit_stage_finished(stage.name(), "error", duration_ms);
                        ctx.log().line(format!("{}: {}", stage.name(), e));
                        error!(stage = stage.name(), dir = %dir.display(), error = %e, "stage aborted the run");
                        emit_run_finished(&run_id, started.elapsed().as_millis() as u64, false);
                        return Err(CiError::Stage {
                            stage: stage.name().to_string(),
                            dir: dir.clone(),
                            source: Box::new(e),
                        });
                    }
                };

                let duration_ms = stage_start.elapsed().as_millis() as u64;
                emit_stage_finished(stage.name(), outcome.label(), duration_ms);
                match &outcome {
                    StageOutcome::Skipped { reason } => {
                        info!(stage = stage.name(), %reason, "stage skipped")
                    }
                    StageOutcome::Failed { reason } => {
                        info!(stage = stage.name(), %reason, "stage failed")
                    }
                    StageOutcome::Passed => {}
                }

                let halts = outcome.halts_run();
                records.push(StageRecord {
                    stage: stage.name().to_string(),
                    outcome,
                    duration_ms,
                });
                if halts {
                    halted_at = Some(stage.name().to_string());
                    break;
                }
            }

            directories.push(DirectoryResult {
                dir: dir.clone(),
                output_dir,
                stages: records,
            });

            if let Some(stage) = halted_at {
                state = RunState::Halted {
                    dir: dir.clone(),
                    stage,
                };
                break;
            }
        }

        if !matches!(state, RunState::Halted { .. }) {
            state = RunState::Done;
        }
        let success = state == RunState::Done;
        let duration_ms = started.elapsed().as_millis() as u64;
        emit_run_finished(&run_id, duration_ms, success);

        Ok(PipelineResult {
            run_id,
            success,
            directories,
            duration_ms,
            final_state: state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Records `<stage>@<dir basename>` into a shared journal.
    struct Probe {
        name: &'static str,
        outcome: StageOutcome,
        journal: Arc<Mutex<Vec<String>>>,
    }

    impl Probe {
        fn new(name: &'static str, outcome: StageOutcome, journal: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name,
                outcome,
                journal: journal.clone(),
            }
        }
    }

    #[async_trait]
    impl Stage for Probe {
        fn name(&self) -> &str {
            self.name
        }

        async fn execute(&self, ctx: &ExecutionContext) -> CiResult<StageOutcome> {
            self.journal
                .lock()
                .expect("journal")
                .push(format!("{}@{}", self.name, dir_basename(ctx.input_dir())));
            Ok(self.outcome.clone())
        }
    }

    struct Broken;

    #[async_trait]
    impl Stage for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn execute(&self, ctx: &ExecutionContext) -> CiResult<StageOutcome> {
            Err(TidyError::MissingInput {
                path: ctx.output_dir().join("warnings.txt"),
                hint: "run the analysis first".to_string(),
            }
            .into())
        }
    }

    fn journal() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn entries(j: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        j.lock().expect("journal").clone()
    }

    #[tokio::test]
    async fn test_stages_run_in_order_per_directory() {
        let j = journal();
        let pipeline = Pipeline::builder()
            .dirs(["/work/a", "/work/b"])
            .stage(Probe::new("first", StageOutcome::Passed, &j))
            .stage(Probe::new("second", StageOutcome::skipped("nothing"), &j))
            .build();
        assert_eq!(pipeline.stage_names(), vec!["first", "second"]);

        let result = pipeline.run().await.expect("run");
        assert_eq!(
            entries(&j),
            vec!["first@a", "second@a", "first@b", "second@b"]
        );
        assert!(result.success);
        assert_eq!(result.final_state, RunState::Done);
        assert_eq!(result.passed_count(), 2);
        assert_eq!(result.skipped_count(), 2);
        assert_eq!(result.exit_code(), 0);
        assert_eq!(result.directories[0].output_dir, PathBuf::from("/work/a"));
    }

    #[tokio::test]
    async fn test_failed_outcome_halts_run() {
        let j = journal();
        let pipeline = Pipeline::builder()
            .dirs(["/work/a", "/work/b"])
            .stage(Probe::new("limits", StageOutcome::failed("x: Exceed limit: (3 > 2)"), &j))
            .stage(Probe::new("after", StageOutcome::Passed, &j))
            .build();

        let result = pipeline.run().await.expect("run");
        assert_eq!(entries(&j), vec!["limits@a"]);
        assert!(!result.success);
        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.exit_code(), 1);
        assert_eq!(result.directories.len(), 1);
        assert!(!result.directories[0].passed());
        assert_eq!(
            result.final_state,
            RunState::Halted {
                dir: PathBuf::from("/work/a"),
                stage: "limits".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_stage_error_aborts_with_context() {
        let j = journal();
        let tmp = tempfile::tempdir().expect("tempdir");
        let logs = tmp.path().join("logs");
        let pipeline = Pipeline::builder()
            .dir("/work/a")
            .log_dir(Some(logs.clone()))
            .boxed_stage(Box::new(Broken))
            .stage(Probe::new("after", StageOutcome::Passed, &j))
            .build();

        let err = pipeline.run().await.unwrap_err();
        match &err {
            CiError::Stage { stage, dir, .. } => {
                assert_eq!(stage, "broken");
                assert_eq!(dir, &PathBuf::from("/work/a"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(entries(&j).is_empty());

        let log_file = std::fs::read_dir(&logs)
            .expect("logs")
            .next()
            .expect("one log")
            .expect("entry")
            .path();
        let text = std::fs::read_to_string(log_file).expect("read log");
        assert!(text.contains("broken: /work/a/warnings.txt not found"));
    }

    #[tokio::test]
    async fn test_output_root_gets_per_directory_folder() {
        let j = journal();
        let tmp = tempfile::tempdir().expect("tempdir");
        let out = tmp.path().join("out");
        let result = Pipeline::builder()
            .dir("/work/hello_world")
            .output_root(Some(out.clone()))
            .stage(Probe::new("only", StageOutcome::Passed, &j))
            .build()
            .run()
            .await
            .expect("run");
        assert_eq!(result.directories[0].output_dir, out.join("hello_world"));
        assert!(out.join("hello_world").is_dir());
    }

    #[tokio::test]
    async fn test_run_from_resumes_at_stage() {
        let j = journal();
        let pipeline = Pipeline::builder()
            .dir("/work/a")
            .stage(Probe::new("filter", StageOutcome::Passed, &j))
            .stage(Probe::new("analysis", StageOutcome::Passed, &j))
            .stage(Probe::new("normalize", StageOutcome::Passed, &j))
            .build();

        pipeline.run_from("analysis").await.expect("run");
        assert_eq!(entries(&j), vec!["analysis@a", "normalize@a"]);

        let err = pipeline.run_from("nope").await.unwrap_err();
        assert!(matches!(err, CiError::Domain(TidyError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_empty_pipeline_is_done() {
        let result = Pipeline::builder().build().run().await.expect("run");
        assert!(result.success);
        assert!(result.directories.is_empty());
        assert_eq!(result.final_state, RunState::Done);
    }
}
