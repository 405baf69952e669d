//! Compile database filter stage.

use async_trait::async_trait;
use tracing::info;

use tidypipe_core::compile_db::{self, database_path};
use tidypipe_core::filter::{cache_targets_clang, FilterPolicy, FlagRewriter, PathFilter};
use tidypipe_core::ArchInclude;

use crate::context::ExecutionContext;
use crate::error::CiResult;
use crate::stage::{Stage, StageOutcome};

/// Restricts the compile database to in-scope translation units and
/// rewrites their compiler flags for clang.
#[derive(Debug, Clone)]
pub struct FilterStage {
    build_dir: String,
    policy: FilterPolicy,
    rewriter: FlagRewriter,
}

impl FilterStage {
    pub fn new(build_dir: impl Into<String>, policy: FilterPolicy) -> Self {
        Self {
            build_dir: build_dir.into(),
            policy,
            rewriter: FlagRewriter::default(),
        }
    }

    pub fn with_arch_include(mut self, arch: Option<ArchInclude>) -> Self {
        self.rewriter = self.rewriter.with_arch_include(arch);
        self
    }

    fn log_policy(&self, ctx: &ExecutionContext, filter: &PathFilter) {
        let log = ctx.log();
        log.line("****** Filter files and dirs ******");
        let policy = filter.policy();
        if policy.include_all {
            log.line("Including all files.");
            return;
        }
        if !policy.include_paths.is_empty() {
            log.line("Included paths:");
            for p in &policy.include_paths {
                log.line(format!("+ > {}", p.display()));
            }
        }
        if !policy.exclude_paths.is_empty() {
            log.line("Excluded paths:");
            for p in &policy.exclude_paths {
                log.line(format!("- > {}", p.display()));
            }
        }
    }

    /// GCC flags need rewriting unless the CMake cache says the project was configured for clang.
    fn needs_flag_rewrite(&self, ctx: &ExecutionContext) -> bool {
        let cache = ctx.build_path(&self.build_dir).join("CMakeCache.txt");
        match std::fs::read_to_string(&cache) {
            Ok(content) => !cache_targets_clang(&content),
            Err(_) => true,
        }
    }
}

#[async_trait]
impl Stage for FilterStage {
    fn name(&self) -> &str {
        "filter_cmd"
    }

    async fn execute(&self, ctx: &ExecutionContext) -> CiResult<StageOutcome> {
        let filter = PathFilter::new(ctx.input_dir(), &self.build_dir, &self.policy);
        self.log_policy(ctx, &filter);

        let db_path = database_path(ctx.input_dir(), &self.build_dir);
        let entries = compile_db::load(&db_path)?;
        let total = entries.len();
        let mut outcome = filter.apply(entries);

        if self.needs_flag_rewrite(ctx) {
            for entry in outcome.kept.iter_mut() {
                self.rewriter.rewrite(entry);
            }
        } else {
            ctx.log().line("Compile database already targets clang, keeping flags.");
        }

        ctx.log().line("Files to be analysed:");
        for entry in &outcome.kept {
            ctx.log().line(format!("+ > {}", entry.file));
        }
        if !outcome.skipped.is_empty() {
            ctx.log().line("Files skipped:");
            for (file, reason) in &outcome.skipped {
                ctx.log().line(format!("- > {} ({})", file, reason.label()));
            }
        }

        compile_db::save(&db_path, &outcome.kept)?;
        ctx.log().line("*".repeat(35));

        info!(
            stage = "filter_cmd",
            total,
            kept = outcome.kept.len(),
            skipped = outcome.skipped.len(),
            "compile database filtered"
        );
        Ok(StageOutcome::Passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MemoryLog;
    use std::path::PathBuf;
    use tidypipe_core::CompileCommand;

    fn project() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().canonicalize().expect("canon");
        std::fs::create_dir_all(root.join("build")).expect("mkdir");
        (tmp, root)
    }

    fn write_db(root: &std::path::Path, entries: &[CompileCommand]) -> PathBuf {
        let db = database_path(root, "build");
        compile_db::save(&db, entries).expect("save");
        db
    }

    #[tokio::test]
    async fn test_filters_and_rewrites() {
        let (_tmp, root) = project();
        let build = root.join("build").to_string_lossy().into_owned();
        let main_c = root.join("main/app.c").to_string_lossy().into_owned();
        let start_s = root.join("main/start.S").to_string_lossy().into_owned();
        let gen_c = root.join("build/gen.c").to_string_lossy().into_owned();
        let db = write_db(
            &root,
            &[
                CompileCommand::new(&main_c, format!("gcc -mlongcalls -c {}", main_c), &build),
                CompileCommand::new(&start_s, format!("gcc -c {}", start_s), &build),
                CompileCommand::new(&gen_c, format!("gcc -c {}", gen_c), &build),
            ],
        );

        let mem = MemoryLog::new();
        let ctx = ExecutionContext::new(&root, &root, mem.sink());
        let stage = FilterStage::new("build", FilterPolicy::default());
        assert_eq!(stage.execute(&ctx).await.expect("execute"), StageOutcome::Passed);

        let kept = compile_db::load(&db).expect("load");
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].file, main_c);
        assert_eq!(kept[0].command.as_deref(), Some(format!("gcc -mlong-calls -c {}", main_c).as_str()));

        let log = mem.contents();
        assert!(log.contains("Including all files."));
        assert!(log.contains(&format!("+ > {}", main_c)));
        assert!(log.contains(&format!(
            "Files skipped:\n- > {} (assembly)\n- > {} (build artifact)\n",
            start_s, gen_c
        )));
    }

    #[tokio::test]
    async fn test_clang_cache_keeps_flags() {
        let (_tmp, root) = project();
        std::fs::write(
            root.join("build/CMakeCache.txt"),
            "IDF_TOOLCHAIN:STRING=clang\n",
        )
        .expect("write cache");
        let main_c = root.join("main/app.c").to_string_lossy().into_owned();
        let db = write_db(
            &root,
            &[CompileCommand::new(&main_c, "clang -mlongcalls -c app.c", root.join("build").to_string_lossy())],
        );

        let ctx = ExecutionContext::new(&root, &root, MemoryLog::new().sink());
        FilterStage::new("build", FilterPolicy::default())
            .execute(&ctx)
            .await
            .expect("execute");

        let kept = compile_db::load(&db).expect("load");
        assert_eq!(kept[0].command.as_deref(), Some("clang -mlongcalls -c app.c"));
    }

    #[tokio::test]
    async fn test_scoped_policy_logs_paths() {
        let (_tmp, root) = project();
        let vendor = root.join("vendor");
        let vendor_c = vendor.join("z.c").to_string_lossy().into_owned();
        let db = write_db(
            &root,
            &[CompileCommand::new(&vendor_c, "gcc -c z.c", root.join("build").to_string_lossy())],
        );

        let mem = MemoryLog::new();
        let ctx = ExecutionContext::new(&root, &root, mem.sink());
        FilterStage::new("build", FilterPolicy::scoped(vec![], vec![vendor.clone()]))
            .execute(&ctx)
            .await
            .expect("execute");

        assert!(compile_db::load(&db).expect("load").is_empty());
        let log = mem.contents();
        assert!(log.contains(&format!("- > {}\n", vendor.display())));
        assert!(log.contains(&format!("- > {} (excluded)", vendor_c)));
    }

    #[tokio::test]
    async fn test_malformed_database_is_fatal() {
        let (_tmp, root) = project();
        std::fs::write(database_path(&root, "build"), "[{").expect("write");
        let ctx = ExecutionContext::new(&root, &root, MemoryLog::new().sink());
        let err = FilterStage::new("build", FilterPolicy::default())
            .execute(&ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("malformed compile database"));
    }
}
