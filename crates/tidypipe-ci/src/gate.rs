//! Run verdict and process exit status.

use serde::{Deserialize, Serialize};

use crate::error::CiResult;
use crate::pipeline::PipelineResult;
use crate::stage::StageOutcome;

/// Gate evaluation verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateVerdict {
    /// Whether the gate passed.
    pub passed: bool,

    /// Violations that caused failure (empty if passed).
    pub violations: Vec<String>,

    /// Summary message.
    pub message: String,
}

/// Pass/fail rules for a finished run.
pub struct RunGate;

impl RunGate {
    /// Every `Failed` stage outcome is a violation. Skipped stages are not.
    pub fn evaluate(result: &PipelineResult) -> GateVerdict {
        let mut violations = Vec::new();

        for dir in &result.directories {
            for record in &dir.stages {
                if let StageOutcome::Failed { reason } = &record.outcome {
                    violations.push(format!(
                        "Stage '{}' failed in {}: {}",
                        record.stage,
                        dir.dir.display(),
                        reason
                    ));
                }
            }
        }

        let passed = violations.is_empty() && result.success;
        let message = if passed {
            "All stages passed".to_string()
        } else {
            format!("Gate failed with {} violation(s)", violations.len())
        };

        GateVerdict {
            passed,
            violations,
            message,
        }
    }

    /// 0 for a successful run, 1 for a failed or aborted one.
    pub fn exit_code(outcome: &CiResult<PipelineResult>) -> i32 {
        match outcome {
            Ok(result) if Self::evaluate(result).passed => 0,
            _ => 1,
        }
    }
}
