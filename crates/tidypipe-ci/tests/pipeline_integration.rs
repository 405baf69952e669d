//! End-to-end pipeline runs over scratch project trees.

use std::path::{Path, PathBuf};

use tidypipe_ci::{
    presets, AnalysisStage, CiError, CommandSpec, ExitPolicy, FilterStage, LimitsStage,
    NormalizeStage, Pipeline, RunGate, RunState, StageOutcome, StripColorStage,
};
use tidypipe_core::compile_db::{self, database_path};
use tidypipe_core::{CompileCommand, FilterPolicy, LimitBudget, RunnerSettings};

/// Tool output as the analysis script prints it from inside `<proj>/build`.
const TOOL_OUTPUT: &str = "printf 'Enabled checks:\\n    bugprone-*\\n\\n\
\\033[1m../../main/a.c:3:5: \\033[0;1;35mwarning: \\033[0munused variable [bugprone-x]\\033[0m\\n'";

struct Project {
    _tmp: tempfile::TempDir,
    root: PathBuf,
    proj: PathBuf,
}

impl Project {
    /// `<root>/proj` with `main/a.c`, `main/start.S` and a two-entry compile database.
    fn new() -> Self {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().canonicalize().expect("canonicalize");
        let proj = root.join("proj");
        std::fs::create_dir_all(proj.join("main")).expect("mkdir main");
        std::fs::create_dir_all(proj.join("build")).expect("mkdir build");
        std::fs::write(proj.join("main/a.c"), "int main(void) { int x; return 0; }\n")
            .expect("write source");

        let build = proj.join("build").to_string_lossy().into_owned();
        let a_c = proj.join("main/a.c").to_string_lossy().into_owned();
        let start_s = proj.join("main/start.S").to_string_lossy().into_owned();
        compile_db::save(
            &database_path(&proj, "build"),
            &[
                CompileCommand::new(
                    &a_c,
                    format!(
                        "xtensa-esp32-elf-gcc -mlongcalls -fmacro-prefix-map={}=. -c {}",
                        proj.display(),
                        a_c
                    ),
                    &build,
                ),
                CompileCommand::new(&start_s, format!("xtensa-esp32-elf-gcc -c {}", start_s), &build),
            ],
        )
        .expect("save database");

        Self {
            _tmp: tmp,
            root,
            proj,
        }
    }

    fn database(&self) -> Vec<CompileCommand> {
        compile_db::load(&database_path(&self.proj, "build")).expect("load database")
    }
}

fn fake_analysis() -> AnalysisStage {
    AnalysisStage::new(
        "build",
        CommandSpec::shell(format!("{}; echo 'progress 1/1' 1>&2; exit 1", TOOL_OUTPUT))
            .accept(ExitPolicy::Any),
    )
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).expect("read file")
}

fn only_log_file(dir: &Path) -> String {
    let entry = std::fs::read_dir(dir)
        .expect("read log dir")
        .next()
        .expect("one log file")
        .expect("dir entry");
    read(&entry.path())
}

#[tokio::test]
async fn test_filter_analyse_normalize_end_to_end() {
    let project = Project::new();
    let out_root = project.root.join("out");

    let result = Pipeline::builder()
        .dir(&project.proj)
        .output_root(Some(out_root.clone()))
        .log_dir(Some(project.root.join("logs")))
        .stage(FilterStage::new("build", FilterPolicy::default()))
        .stage(fake_analysis())
        .stage(StripColorStage::new())
        .stage(LimitsStage::new(
            LimitBudget::new().with_limit("bugprone-x", 1),
            vec![],
            "build",
        ))
        .stage(NormalizeStage::new(&project.proj))
        .build()
        .run()
        .await
        .expect("pipeline run");

    assert!(result.success);
    assert_eq!(result.final_state, RunState::Done);
    assert_eq!(result.passed_count(), 5);
    assert!(RunGate::evaluate(&result).passed);

    let kept = project.database();
    assert_eq!(kept.len(), 1);
    assert!(kept[0].file.ends_with("main/a.c"));
    let command = kept[0].command.as_deref().expect("command");
    assert!(command.contains("-mlong-calls"));
    assert!(!command.contains("prefix-map"));

    let warnings = read(&out_root.join("proj").join("warnings.txt"));
    let diagnostic = warnings
        .lines()
        .find(|l| l.contains("[bugprone-x]"))
        .expect("diagnostic line");
    assert_eq!(diagnostic, "main/a.c:3:5: warning: unused variable [bugprone-x]");
    assert!(warnings.starts_with("Enabled checks:"));

    let log = only_log_file(&project.root.join("logs"));
    assert!(log.contains("Files to be analysed:"));
    assert!(log.contains("progress 1/1"));
    assert!(log.contains("bugprone-x: Within limit: (1 <= 1)"));
    assert!(log.contains("Normalized file"));
}

#[tokio::test]
async fn test_exceeded_budget_halts_before_normalize() {
    let project = Project::new();
    let logs = project.root.join("logs");

    let result = Pipeline::builder()
        .dir(&project.proj)
        .log_dir(Some(logs.clone()))
        .stage(FilterStage::new("build", FilterPolicy::default()))
        .stage(fake_analysis())
        .stage(StripColorStage::new())
        .stage(LimitsStage::new(
            LimitBudget::new().with_limit("bugprone-x", 0),
            vec![],
            "build",
        ))
        .stage(NormalizeStage::new(&project.proj))
        .build()
        .run()
        .await
        .expect("pipeline run");

    assert!(!result.success);
    assert_eq!(
        result.final_state,
        RunState::Halted {
            dir: project.proj.clone(),
            stage: "check_limits".to_string()
        }
    );
    let last = result.directories[0].stages.last().expect("stage record");
    assert_eq!(last.outcome, StageOutcome::failed("bugprone-x: Exceed limit: (1 > 0)"));
    assert_eq!(RunGate::exit_code(&Ok(result)), 1);

    // normalization never ran
    let warnings = read(&project.proj.join("warnings.txt"));
    assert!(warnings.contains("../../main/a.c:3:5"));
    assert!(only_log_file(&logs).contains("\t../../main/a.c:3:5: warning: unused variable"));
}

#[tokio::test]
async fn test_missing_banner_aborts_run() {
    let project = Project::new();

    let outcome = Pipeline::builder()
        .dir(&project.proj)
        .log_dir(Some(project.root.join("logs")))
        .stage(FilterStage::new("build", FilterPolicy::default()))
        .stage(AnalysisStage::new(
            "build",
            CommandSpec::shell("echo 'Error while trying to load a compilation database'"),
        ))
        .stage(NormalizeStage::new(&project.proj))
        .build()
        .run()
        .await;

    assert_eq!(RunGate::exit_code(&outcome), 1);
    match outcome.unwrap_err() {
        CiError::Stage { stage, dir, source } => {
            assert_eq!(stage, "run_clang_tidy");
            assert_eq!(dir, project.proj);
            assert!(source.to_string().contains("did not report its enabled checks"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_missing_compile_database_aborts_run() {
    let project = Project::new();
    std::fs::remove_file(database_path(&project.proj, "build")).expect("remove database");

    let outcome = Pipeline::builder()
        .dir(&project.proj)
        .log_dir(Some(project.root.join("logs")))
        .stage(FilterStage::new("build", FilterPolicy::default()))
        .build()
        .run()
        .await;

    let err = outcome.unwrap_err();
    assert!(err.to_string().contains("filter_cmd"));
    assert!(err.to_string().contains("compile_commands.json not found"));
}

#[tokio::test]
async fn test_clang_tidy_preset_resumed_after_reconfigure() {
    let project = Project::new();
    let script = project.root.join("fake-run-clang-tidy.sh");
    std::fs::write(
        &script,
        format!("#!/bin/sh\n{}\necho 'progress' 1>&2\nexit 1\n", TOOL_OUTPUT),
    )
    .expect("write script");

    let mut settings = RunnerSettings::new(vec![project.proj.clone()], &project.proj)
        .with_run_clang_tidy_py(&script.to_string_lossy());
    settings.python = "sh".to_string();
    settings.clang_extra_args = "-p .".to_string();
    settings.log_path = Some(project.root.join("logs"));
    settings.limits = LimitBudget::new().with_limit("bugprone-x", 5);

    let pipeline = presets::clang_tidy(&settings);
    let result = pipeline.run_from("filter_cmd").await.expect("pipeline run");

    assert!(result.success);
    let stages: Vec<&str> = result.directories[0]
        .stages
        .iter()
        .map(|r| r.stage.as_str())
        .collect();
    assert_eq!(
        stages,
        vec![
            "filter_cmd",
            "run_clang_tidy",
            "remove_color_output",
            "check_limits",
            "normalize_output_path"
        ]
    );
    let warnings = read(&project.proj.join("warnings.txt"));
    assert!(warnings.contains("\nmain/a.c:3:5: warning: unused variable [bugprone-x]\n"));
}
