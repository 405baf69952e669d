//! Compile database (`compile_commands.json`) entries and persistence.
//!
//! The schema belongs to the build system; only `file`, `command`,
//! `arguments` and `directory` are interpreted and every other field is
//! carried through untouched on write-back.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TidyError};

/// File name of the compile database inside the build directory.
pub const COMPILE_COMMANDS_FILENAME: &str = "compile_commands.json";

/// One translation unit from the compile database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompileCommand {
    /// Source file, usually absolute.
    pub file: String,

    /// Compiler invocation as a single shell string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Compiler invocation as an argv array (alternative to `command`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<String>>,

    /// Working directory of the compiler invocation.
    pub directory: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CompileCommand {
    /// Create an entry with a shell-string invocation.
    pub fn new(file: impl Into<String>, command: impl Into<String>, directory: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            command: Some(command.into()),
            arguments: None,
            directory: directory.into(),
            extra: Map::new(),
        }
    }

    /// Source file path, resolved against the entry's working directory.
    pub fn source_path(&self) -> PathBuf {
        crate::paths::resolve_against(Path::new(&self.directory), Path::new(&self.file))
    }

    /// The compiler invocation rendered as one string.
    pub fn invocation(&self) -> String {
        match (&self.command, &self.arguments) {
            (Some(cmd), _) => cmd.clone(),
            (None, Some(args)) => args.join(" "),
            (None, None) => String::new(),
        }
    }
}

/// Location of the compile database for a project directory.
pub fn database_path(project_dir: &Path, build_dir: &str) -> PathBuf {
    project_dir.join(build_dir).join(COMPILE_COMMANDS_FILENAME)
}

/// Read and parse the compile database.
pub fn load(path: &Path) -> Result<Vec<CompileCommand>> {
    let raw = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            TidyError::MissingInput {
                path: path.to_path_buf(),
                hint: "Please run the build system reconfigure step to generate it".to_string(),
            }
        } else {
            TidyError::file_io(path, e)
        }
    })?;
    serde_json::from_str(&raw).map_err(|source| TidyError::CompileDatabase {
        path: path.to_path_buf(),
        source,
    })
}

/// Replace the compile database with `entries`.
///
/// Written to a sibling file first and renamed over the original, so readers
/// never observe a half-written database.
pub fn save(path: &Path, entries: &[CompileCommand]) -> Result<()> {
    let content = serde_json::to_string(entries)?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, content).map_err(|e| TidyError::file_io(&staging, e))?;
    fs::rename(&staging, path).map_err(|e| TidyError::file_io(path, e))?;
    Ok(())
}
