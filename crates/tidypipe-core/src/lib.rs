//! tidypipe core library
//!
//! Pure building blocks of the clang-tidy pipeline: compile database
//! filtering and flag rewriting, the diagnostic line grammar, per-check
//! budgets, path normalization and the renderer report model. Nothing in
//! this crate spawns processes; see `tidypipe-ci` for the stage engine.

pub mod compile_db;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod filter;
pub mod limits;
pub mod normalize;
pub mod obs;
pub mod paths;
pub mod report;
pub mod telemetry;

pub use compile_db::{CompileCommand, COMPILE_COMMANDS_FILENAME};
pub use config::{LimitConfig, RunnerSettings, DEFAULT_CLANG_EXTRA_ARGS};
pub use diagnostic::{
    check_banner, parse_diagnostics, parse_document, read_text_lossy, read_warnings,
    require_warnings, strip_ansi, warnings_path,
    DiagnosticRecord, ParsedLine, BANNER_TOKEN, WARNINGS_FILENAME,
};
pub use error::{Result, TidyError};
pub use filter::{
    ArchInclude, FilterDecision, FilterOutcome, FilterPolicy, FlagRewriter, PathFilter,
    DEFAULT_XTENSA_INCLUDE_DIR,
};
pub use limits::{LimitBudget, LimitEnforcer, LimitReport, RuleTally};
pub use normalize::PathNormalizer;
pub use obs::{
    emit_directory_entered, emit_run_finished, emit_run_started, emit_stage_finished, run_span,
};
pub use report::{write_report_json, ReportBuilder, ReportItem, HTML_REPORT_DIRNAME, REPORT_FILENAME};
pub use telemetry::init_tracing;

/// tidypipe version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
