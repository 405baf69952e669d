//! tidypipe CI - stage pipeline engine for clang-tidy runs
//!
//! Provides a pipeline orchestrator that:
//! - Runs an ordered list of stages once per project directory
//! - Streams external process output into a per-directory log sink
//! - Filters the compile database, runs the analysis, enforces check limits
//!   and normalizes diagnostic paths
//! - Turns the run result into a verdict and exit status

pub mod context;
pub mod error;
pub mod gate;
pub mod pipeline;
pub mod presets;
pub mod runner;
pub mod stage;
pub mod stages;

// Re-export key types
pub use context::{ExecutionContext, LogSink, MemoryLog};
pub use error::{CiError, CiResult};
pub use gate::{GateVerdict, RunGate};
pub use pipeline::{DirectoryResult, Pipeline, PipelineBuilder, PipelineResult, RunState, StageRecord};
pub use runner::{CommandResult, CommandSpec, ExitPolicy, ProcessRunner};
pub use stage::{Stage, StageOutcome};
pub use stages::{
    AnalysisStage, CommandStage, FilterStage, HtmlReportStage, LimitsStage, NormalizeStage,
    StripColorStage, WorkDir,
};
