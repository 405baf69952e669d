//! clang-tidy diagnostic records and the line grammar used to parse them.
//!
//! A diagnostic line has the shape
//!
//! ```text
//! PATH:LINE:COLUMN: SEVERITY: MESSAGE [RULE_ID]
//! ```
//!
//! Capture groups of [`diagnostic_regex`]:
//!
//! | group      | content                                                 |
//! |------------|---------------------------------------------------------|
//! | `path`     | run of word chars, `/`, `.`, `-` and spaces             |
//! | `line`     | decimal line number                                     |
//! | `column`   | decimal column number                                   |
//! | `severity` | shortest text up to the next `": "`                     |
//! | `message`  | free text up to the trailing bracket                    |
//! | `rule`     | comma-joined dotted/hyphenated check names, in brackets |
//!
//! Lines that do not match (banners, notes without a check name, summaries,
//! source excerpts) are not diagnostics and are passed through as text.

use std::borrow::Cow;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TidyError};

/// File the analysis stage writes its raw output to.
pub const WARNINGS_FILENAME: &str = "warnings.txt";

/// Token clang-tidy prints on its first line when it started correctly.
pub const BANNER_TOKEN: &str = "Enabled checks";

/// The diagnostic line grammar. See the module docs for the capture groups.
pub fn diagnostic_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<path>[\w/.\- ]+):(?P<line>\d+):(?P<column>\d+): (?P<severity>.+?): (?P<message>.+) \[(?P<rule>[\w\-,.]+)\]\s*$",
        )
        .expect("valid diagnostic regex")
    })
}

fn ansi_escape_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // 7-bit C1 Fe (except CSI), or CSI followed by parameter/intermediate/final bytes
    RE.get_or_init(|| {
        Regex::new(r"\x1B(?:[@-Z\x5C-_]|\[[0-?]*[ -/]*[@-~])").expect("valid ansi regex")
    })
}

/// A single parsed clang-tidy diagnostic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticRecord {
    /// Source file path as printed by the tool.
    pub path: String,

    /// Line number (1-indexed).
    pub line: u32,

    /// Column number (1-indexed).
    pub column: u32,

    /// Severity class, e.g. `warning` or `error`.
    pub severity: String,

    /// Human-readable message.
    pub message: String,

    /// Check name(s), e.g. `bugprone-branch-clone` or `a,b` when several fired.
    pub rule: String,
}

impl DiagnosticRecord {
    /// Parse one line, returning the record and the byte span of its path.
    pub fn parse_with_span(line: &str) -> Option<(Self, Range<usize>)> {
        let caps = diagnostic_regex().captures(line.trim_end_matches(['\n', '\r']))?;
        let path = caps.name("path")?;
        let record = Self {
            path: path.as_str().to_string(),
            line: caps.name("line")?.as_str().parse().ok()?,
            column: caps.name("column")?.as_str().parse().ok()?,
            severity: caps.name("severity")?.as_str().to_string(),
            message: caps.name("message")?.as_str().to_string(),
            rule: caps.name("rule")?.as_str().to_string(),
        };
        Some((record, path.range()))
    }

    /// Parse one line of tool output.
    pub fn parse(line: &str) -> Option<Self> {
        Self::parse_with_span(line).map(|(record, _)| record)
    }

    /// Individual check names cited by this diagnostic.
    pub fn rules(&self) -> impl Iterator<Item = &str> {
        self.rule.split(',').map(str::trim).filter(|r| !r.is_empty())
    }

    /// `path:line:col: severity: message`, without the rule suffix.
    pub fn location_line(&self) -> String {
        format!(
            "{}:{}:{}: {}: {}",
            self.path, self.line, self.column, self.severity, self.message
        )
    }
}

/// One line of a diagnostics document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Diagnostic(DiagnosticRecord),
    Text(String),
}

/// Parse a whole diagnostics document, keeping every line in order.
pub fn parse_document(text: &str) -> Vec<ParsedLine> {
    text.lines()
        .map(|line| match DiagnosticRecord::parse(line) {
            Some(record) => ParsedLine::Diagnostic(record),
            None => ParsedLine::Text(line.to_string()),
        })
        .collect()
}

/// Only the diagnostics of a document, in input order.
pub fn parse_diagnostics(text: &str) -> Vec<DiagnosticRecord> {
    text.lines().filter_map(DiagnosticRecord::parse).collect()
}

/// Fail unless the first line carries the tool's enabled-checks banner.
pub fn check_banner(text: &str) -> Result<()> {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.contains(BANNER_TOKEN) {
        Ok(())
    } else {
        Err(TidyError::MissingBanner {
            first_line: first_line.to_string(),
        })
    }
}

/// Remove ANSI colour/control sequences.
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    ansi_escape_regex().replace_all(text, "")
}

/// Location of the diagnostics file inside an output directory.
pub fn warnings_path(output_dir: &Path) -> PathBuf {
    output_dir.join(WARNINGS_FILENAME)
}

/// Read a tool transcript. Bytes that are not UTF-8 (source lines echoed
/// from Latin-1 files) become U+FFFD instead of failing the read.
pub fn read_text_lossy(path: &Path) -> Result<String> {
    let raw = fs::read(path).map_err(|e| TidyError::file_io(path, e))?;
    Ok(match String::from_utf8(raw) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

/// Path of the diagnostics file, failing with a hint when the analysis never ran.
pub fn require_warnings(output_dir: &Path) -> Result<PathBuf> {
    let path = warnings_path(output_dir);
    if !path.is_file() {
        return Err(TidyError::MissingInput {
            path,
            hint: "Please run clang-tidy to generate this file".to_string(),
        });
    }
    Ok(path)
}

/// Read the diagnostics file, failing with a hint when the analysis never ran.
pub fn read_warnings(output_dir: &Path) -> Result<(PathBuf, String)> {
    let path = require_warnings(output_dir)?;
    let text = read_text_lossy(&path)?;
    Ok((path, text))
}
