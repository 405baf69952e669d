//! Structured tracing hooks for the pipeline lifecycle.
//!
//! - `run_span`: a span tagged with the run id, meant for `Instrument`
//! - `emit_*`: one `info!` event per lifecycle step (run start/finish,
//!   directory entered, stage finished)

use tracing::{info, Span};

/// Run-scoped span.
///
/// ```ignore
/// run(..).instrument(run_span("3f2c…")).await
/// // every event inside carries run_id
/// ```
pub fn run_span(run_id: &str) -> Span {
    tracing::info_span!("tidypipe.run", run_id = %run_id)
}

pub fn emit_run_started(run_id: &str, dirs: usize, stages: usize) {
    info!(event = "run.started", run_id = %run_id, dirs = dirs, stages = stages);
}

pub fn emit_directory_entered(dir: &str, output_dir: &str) {
    info!(event = "dir.entered", dir = %dir, output_dir = %output_dir);
}

/// `outcome` is one of `passed`, `skipped`, `failed`, `error`.
pub fn emit_stage_finished(stage: &str, outcome: &str, duration_ms: u64) {
    info!(
        event = "stage.finished",
        stage = %stage,
        outcome = %outcome,
        duration_ms = duration_ms,
    );
}

pub fn emit_run_finished(run_id: &str, duration_ms: u64, success: bool) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        success = success,
    );
}
