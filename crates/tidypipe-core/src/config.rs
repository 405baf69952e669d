//! Run configuration.
//!
//! [`LimitConfig`] mirrors the limit file (`skip`, `ignore`, `limits`).
//! [`RunnerSettings`] carries everything a run needs; it is built by the
//! caller and handed to the pipeline presets. The environment is consulted
//! only in [`RunnerSettings::base_dir_from_env`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::filter::{ArchInclude, FilterPolicy};
use crate::limits::LimitBudget;

/// Default analysis-tool arguments: header filter plus the standard check set.
pub const DEFAULT_CLANG_EXTRA_ARGS: &str = concat!(
    r#"-header-filter=".*\..*" "#,
    r#"-checks="-*,clang-analyzer-core.NullDereference,clang-analyzer-unix.*,bugprone-*,"#,
    r#"-bugprone-macro-parentheses,readability-*,performance-*,-readability-magic-numbers,"#,
    r#"-readability-avoid-const-params-in-decls""#,
);

/// Environment variable naming the SDK root used as default base directory.
pub const BASE_DIR_ENV: &str = "IDF_PATH";

/// Paths to skip, checks to hide and per-check budgets.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LimitConfig {
    #[serde(default)]
    pub skip: Vec<PathBuf>,

    #[serde(default)]
    pub ignore: Vec<String>,

    #[serde(default)]
    pub limits: BTreeMap<String, usize>,
}

impl LimitConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        // an empty document deserializes to null
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(s).context("parse limit file")
    }

    /// Load a YAML limit file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
        Self::from_yaml_str(&raw).with_context(|| format!("in {:?}", path))
    }

    pub fn budget(&self) -> LimitBudget {
        LimitBudget::from(self.limits.clone())
    }
}

/// Everything one run needs, explicit and environment-free.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunnerSettings {
    /// Project directories, processed in order.
    pub dirs: Vec<PathBuf>,

    /// Build directory name, relative to each project directory.
    pub build_dir: String,

    /// Root for per-project output directories; the project directory itself when unset.
    pub output_path: Option<PathBuf>,

    /// Directory for per-project log files; stdout when unset.
    pub log_path: Option<PathBuf>,

    pub filter: FilterPolicy,

    /// Checks hidden from the HTML report.
    pub ignore_checks: Vec<String>,

    pub limits: LimitBudget,

    pub arch_include: Option<ArchInclude>,

    /// Python interpreter used to launch the analysis script.
    pub python: String,

    /// The `run-clang-tidy.py` script.
    pub run_clang_tidy_py: String,

    /// File regexes passed positionally to the script.
    pub check_files_regex: Vec<String>,

    pub clang_extra_args: String,

    /// Base directory diagnostic paths are made relative to.
    pub base_dir: PathBuf,

    /// Let analysis findings fail the run (tool exit code 0 only).
    pub reflect_findings: bool,
}

impl RunnerSettings {
    pub fn new(dirs: Vec<PathBuf>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            dirs,
            build_dir: "build".to_string(),
            output_path: None,
            log_path: None,
            filter: FilterPolicy::default(),
            ignore_checks: Vec::new(),
            limits: LimitBudget::new(),
            arch_include: None,
            python: "python3".to_string(),
            run_clang_tidy_py: "run-clang-tidy.py".to_string(),
            check_files_regex: vec![".*".to_string()],
            clang_extra_args: DEFAULT_CLANG_EXTRA_ARGS.to_string(),
            base_dir: base_dir.into(),
            reflect_findings: false,
        }
    }

    /// `IDF_PATH` when set, otherwise the working directory.
    pub fn base_dir_from_env() -> PathBuf {
        std::env::var_os(BASE_DIR_ENV)
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Fold a limit file in: `skip` extends the exclude list, `ignore` and `limits` replace.
    pub fn with_limit_config(mut self, cfg: &LimitConfig) -> Self {
        self.filter.exclude_paths.extend(cfg.skip.iter().cloned());
        self.ignore_checks = cfg.ignore.clone();
        self.limits = cfg.budget();
        self
    }

    /// Use the script at `path` if it exists on disk, else leave the bare name for `PATH` lookup.
    pub fn with_run_clang_tidy_py(mut self, path: &str) -> Self {
        self.run_clang_tidy_py = std::fs::canonicalize(path)
            .ok()
            .filter(|p| p.is_file())
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());
        self
    }

    /// Resolved exclude paths, shared by the filter, limit and report passes.
    pub fn resolved_exclude_paths(&self) -> Vec<PathBuf> {
        self.filter.resolved().exclude_paths
    }
}
