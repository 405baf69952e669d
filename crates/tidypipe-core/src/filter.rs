//! Compile database filtering and compiler-flag rewriting.
//!
//! [`PathFilter`] decides which translation units are analysed;
//! [`FlagRewriter`] turns the retained GCC invocations into something the
//! clang front end accepts.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::compile_db::CompileCommand;
use crate::paths::{is_under, is_under_any};

/// Suffixes treated as assembly sources. These never reach the analyser.
pub const ASSEMBLY_SUFFIXES: &[&str] = &["S", "s", "asm"];

/// GCC-only flags and their clang replacement (empty = drop).
pub const GCC_FLAGS_MAPPING: &[(&str, &str)] = &[
    ("-fstrict-volatile-bitfields", ""),
    ("-fno-tree-switch-conversion", ""),
    ("-fno-test-coverage", ""),
    ("-mlongcalls", "-mlong-calls"),
];

/// Default include directory of the Xtensa clang toolchain.
pub const DEFAULT_XTENSA_INCLUDE_DIR: &str =
    "/opt/espressif/xtensa-esp32-elf-clang/xtensa-esp32-elf/include/";

/// Marker in `CMakeCache.txt` meaning the database already targets clang.
pub const CLANG_TOOLCHAIN_MARKER: &str = "IDF_TOOLCHAIN:STRING=clang";

fn prefix_map_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\s-f(?:macro|debug|file)-prefix-map=\S+").expect("valid prefix-map regex")
    })
}

fn is_prefix_map_flag(token: &str) -> bool {
    ["-fmacro-prefix-map=", "-fdebug-prefix-map=", "-ffile-prefix-map="]
        .iter()
        .any(|p| token.starts_with(p))
}

/// Include/exclude policy for translation units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilterPolicy {
    /// Analyse everything outside the build directory, ignoring the lists.
    pub include_all: bool,

    /// Extra trees analysed besides the project directory.
    #[serde(default)]
    pub include_paths: Vec<PathBuf>,

    /// Trees never analysed.
    #[serde(default)]
    pub exclude_paths: Vec<PathBuf>,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            include_all: true,
            include_paths: Vec::new(),
            exclude_paths: Vec::new(),
        }
    }
}

impl FilterPolicy {
    /// Policy restricted to the project directory plus `include`, minus `exclude`.
    pub fn scoped(include: Vec<PathBuf>, exclude: Vec<PathBuf>) -> Self {
        Self {
            include_all: false,
            include_paths: include,
            exclude_paths: exclude,
        }
    }

    /// Resolve every configured path against the working directory.
    pub fn resolved(&self) -> Self {
        Self {
            include_all: self.include_all,
            include_paths: self.include_paths.iter().map(|p| crate::paths::resolve(p)).collect(),
            exclude_paths: self.exclude_paths.iter().map(|p| crate::paths::resolve(p)).collect(),
        }
    }
}

/// Why an entry was kept or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Keep,
    Assembly,
    BuildArtifact,
    Excluded,
    OutOfScope,
}

impl FilterDecision {
    pub fn label(self) -> &'static str {
        match self {
            FilterDecision::Keep => "kept",
            FilterDecision::Assembly => "assembly",
            FilterDecision::BuildArtifact => "build artifact",
            FilterDecision::Excluded => "excluded",
            FilterDecision::OutOfScope => "out of scope",
        }
    }
}

/// Result of filtering one compile database.
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub kept: Vec<CompileCommand>,
    pub skipped: Vec<(String, FilterDecision)>,
}

/// Decides which translation units of one project are in scope.
#[derive(Debug, Clone)]
pub struct PathFilter {
    project_dir: PathBuf,
    build_dir: PathBuf,
    policy: FilterPolicy,
}

impl PathFilter {
    /// `project_dir` and the policy paths are resolved here; `build_dir` is
    /// relative to `project_dir`.
    pub fn new(project_dir: &Path, build_dir: &str, policy: &FilterPolicy) -> Self {
        let project_dir = crate::paths::resolve(project_dir);
        let build_dir = crate::paths::resolve_against(&project_dir, Path::new(build_dir));
        Self {
            project_dir,
            build_dir,
            policy: policy.resolved(),
        }
    }

    pub fn policy(&self) -> &FilterPolicy {
        &self.policy
    }

    /// Classify a single entry.
    pub fn decide(&self, entry: &CompileCommand) -> FilterDecision {
        let file = entry.source_path();

        let is_asm = file
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| ASSEMBLY_SUFFIXES.contains(&ext))
            .unwrap_or(false);
        if is_asm {
            return FilterDecision::Assembly;
        }

        if is_under(&file, &self.build_dir) {
            return FilterDecision::BuildArtifact;
        }

        if !self.policy.include_all {
            if is_under_any(&file, &self.policy.exclude_paths) {
                return FilterDecision::Excluded;
            }
            let included = is_under_any(&file, &self.policy.include_paths)
                || is_under(&file, &self.project_dir);
            if !included {
                return FilterDecision::OutOfScope;
            }
        }

        FilterDecision::Keep
    }

    /// Split `entries` into the retained subset (input order preserved) and the skipped files.
    pub fn apply(&self, entries: Vec<CompileCommand>) -> FilterOutcome {
        let mut outcome = FilterOutcome::default();
        for entry in entries {
            match self.decide(&entry) {
                FilterDecision::Keep => outcome.kept.push(entry),
                other => outcome.skipped.push((entry.file.clone(), other)),
            }
        }
        outcome
    }
}

/// Extra system include injected for a cross-compilation target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArchInclude {
    pub dir: String,
    /// Macro defined alongside the include, e.g. `__XTENSA__`.
    pub define: String,
}

impl ArchInclude {
    pub fn xtensa(dir: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            define: "__XTENSA__".to_string(),
        }
    }

    fn flags(&self) -> [String; 2] {
        [format!("-isystem{}", self.dir), format!("-D{}", self.define)]
    }
}

/// Rewrites compiler invocations for the clang front end.
#[derive(Debug, Clone)]
pub struct FlagRewriter {
    replacements: Vec<(String, String)>,
    arch_include: Option<ArchInclude>,
}

impl Default for FlagRewriter {
    fn default() -> Self {
        Self {
            replacements: GCC_FLAGS_MAPPING
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            arch_include: None,
        }
    }
}

impl FlagRewriter {
    pub fn with_arch_include(mut self, arch: Option<ArchInclude>) -> Self {
        self.arch_include = arch;
        self
    }

    /// Rewrite a shell-string invocation.
    pub fn rewrite_command(&self, command: &str) -> String {
        let mut padded = format!(" {} ", command);

        for (from, to) in &self.replacements {
            let needle = format!(" {} ", from);
            let with = if to.is_empty() {
                " ".to_string()
            } else {
                format!(" {} ", to)
            };
            // adjacent duplicates share a separator, so repeat until stable
            while padded.contains(&needle) {
                padded = padded.replace(&needle, &with);
            }
        }

        padded = prefix_map_regex().replace_all(&padded, "").into_owned();

        if let Some(arch) = &self.arch_include {
            if let Some(pos) = padded.find(" -c ") {
                let [isystem, define] = arch.flags();
                padded.insert_str(pos, &format!(" {} {}", isystem, define));
            }
        }

        padded.trim().to_string()
    }

    /// Rewrite an argv-style invocation.
    pub fn rewrite_arguments(&self, args: &[String]) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(args.len() + 2);
        for arg in args {
            if is_prefix_map_flag(arg) {
                continue;
            }
            match self.replacements.iter().find(|(from, _)| from == arg) {
                Some((_, to)) if to.is_empty() => {}
                Some((_, to)) => out.push(to.clone()),
                None => out.push(arg.clone()),
            }
        }
        if let Some(arch) = &self.arch_include {
            if let Some(pos) = out.iter().position(|a| a == "-c") {
                let [isystem, define] = arch.flags();
                out.insert(pos, define);
                out.insert(pos, isystem);
            }
        }
        out
    }

    /// Rewrite whichever invocation form the entry carries.
    pub fn rewrite(&self, entry: &mut CompileCommand) {
        if let Some(cmd) = entry.command.as_mut() {
            *cmd = self.rewrite_command(cmd);
        }
        if let Some(args) = entry.arguments.as_mut() {
            *args = self.rewrite_arguments(args);
        }
    }
}

/// True when the CMake cache shows the project was configured for clang.
pub fn cache_targets_clang(cmake_cache: &str) -> bool {
    cmake_cache.contains(CLANG_TOOLCHAIN_MARKER)
}
