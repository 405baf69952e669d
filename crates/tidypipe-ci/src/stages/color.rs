//! Strips terminal colour codes from the diagnostics file.

use async_trait::async_trait;
use tracing::debug;

use tidypipe_core::diagnostic::{read_text_lossy, strip_ansi, warnings_path};
use tidypipe_core::TidyError;

use crate::context::ExecutionContext;
use crate::error::CiResult;
use crate::stage::{Stage, StageOutcome};

#[derive(Debug, Clone, Default)]
pub struct StripColorStage;

impl StripColorStage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Stage for StripColorStage {
    fn name(&self) -> &str {
        "remove_color_output"
    }

    async fn execute(&self, ctx: &ExecutionContext) -> CiResult<StageOutcome> {
        let path = warnings_path(ctx.output_dir());
        let text = read_text_lossy(&path)?;
        let stripped = strip_ansi(&text);
        let changed = stripped.len() != text.len();
        std::fs::write(&path, stripped.as_bytes()).map_err(|e| TidyError::file_io(&path, e))?;

        debug!(path = %path.display(), changed, "colour codes stripped");
        ctx.log()
            .line(format!("color outputs in \"{}\" are eliminated.", path.display()));
        Ok(StageOutcome::Passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MemoryLog;

    #[tokio::test]
    async fn test_strips_in_place() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("warnings.txt");
        std::fs::write(
            &path,
            "Enabled checks:\n\x1b[1ma.c:1:2: \x1b[0;1;35mwarning: \x1b[0mw [bugprone-x]\x1b[0m\n",
        )
        .expect("write");

        let mem = MemoryLog::new();
        let ctx = ExecutionContext::new(tmp.path(), tmp.path(), mem.sink());
        let outcome = StripColorStage::new().execute(&ctx).await.expect("execute");
        assert_eq!(outcome, StageOutcome::Passed);
        assert_eq!(
            std::fs::read_to_string(&path).expect("read"),
            "Enabled checks:\na.c:1:2: warning: w [bugprone-x]\n"
        );
        assert!(mem.contents().contains("are eliminated."));
    }

    #[tokio::test]
    async fn test_invalid_utf8_does_not_abort() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("warnings.txt");
        std::fs::write(&path, b"Enabled checks:\n\x1b[1m/* caf\xe9 */\x1b[0m\n").expect("write");

        let ctx = ExecutionContext::new(tmp.path(), tmp.path(), MemoryLog::new().sink());
        let outcome = StripColorStage::new().execute(&ctx).await.expect("execute");
        assert_eq!(outcome, StageOutcome::Passed);
        assert_eq!(
            std::fs::read_to_string(&path).expect("read"),
            "Enabled checks:\n/* caf\u{fffd} */\n"
        );
    }

    #[tokio::test]
    async fn test_missing_file_errors() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ctx = ExecutionContext::new(tmp.path(), tmp.path(), MemoryLog::new().sink());
        assert!(StripColorStage::new().execute(&ctx).await.is_err());
    }
}
