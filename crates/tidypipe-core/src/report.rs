//! Report document handed to the external HTML renderer.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::diagnostic::DiagnosticRecord;
use crate::paths::{is_under_any, resolve_against};

/// File name of the serialized report inside the output directory.
pub const REPORT_FILENAME: &str = "report.json";

/// Directory the renderer writes the HTML tree into.
pub const HTML_REPORT_DIRNAME: &str = "html_report";

/// A diagnostic in the shape the renderer consumes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportItem {
    pub path: String,
    pub line: u32,
    pub severity: String,
    pub message: String,
    pub rule: String,
    pub column: u32,
}

impl From<&DiagnosticRecord> for ReportItem {
    fn from(d: &DiagnosticRecord) -> Self {
        Self {
            path: d.path.clone(),
            line: d.line,
            severity: d.severity.clone(),
            message: d.message.clone(),
            rule: d.rule.clone(),
            column: d.column,
        }
    }
}

/// True when `rule` matches an ignore entry exactly or a trailing-`*` prefix glob.
pub fn rule_matches(pattern: &str, rule: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => rule.starts_with(prefix),
        None => pattern == rule,
    }
}

/// Projects diagnostics into report items.
#[derive(Debug, Clone, Default)]
pub struct ReportBuilder {
    ignore: Vec<String>,
    exclude_paths: Vec<PathBuf>,
    anchor: PathBuf,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks left out of the report.
    pub fn with_ignore(mut self, ignore: Vec<String>) -> Self {
        self.ignore = ignore;
        self
    }

    /// Resolved trees left out of the report; relative diagnostic paths resolve against `anchor`.
    pub fn with_exclude_paths(mut self, exclude: Vec<PathBuf>, anchor: impl Into<PathBuf>) -> Self {
        self.exclude_paths = exclude;
        self.anchor = anchor.into();
        self
    }

    fn is_ignored(&self, diag: &DiagnosticRecord) -> bool {
        diag.rules()
            .any(|rule| self.ignore.iter().any(|pat| rule_matches(pat, rule)))
    }

    fn is_excluded(&self, diag: &DiagnosticRecord) -> bool {
        !self.exclude_paths.is_empty()
            && is_under_any(
                &resolve_against(&self.anchor, Path::new(&diag.path)),
                &self.exclude_paths,
            )
    }

    /// Input order is preserved.
    pub fn build(&self, diagnostics: &[DiagnosticRecord]) -> Vec<ReportItem> {
        diagnostics
            .iter()
            .filter(|d| !self.is_ignored(d) && !self.is_excluded(d))
            .map(ReportItem::from)
            .collect()
    }
}

/// Write the report document as pretty JSON.
pub fn write_report_json(path: &Path, items: &[ReportItem]) -> Result<()> {
    let content = serde_json::to_string_pretty(items).context("serialize report items")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}
