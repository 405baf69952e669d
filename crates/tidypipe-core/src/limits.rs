//! Per-check violation budgets.
//!
//! Evaluates parsed diagnostics against a [`LimitBudget`] to produce a
//! [`LimitReport`]: one tally per budgeted check with the contributing
//! diagnostics, plus the overall pass/fail decision. Only checks named in
//! the budget are counted; everything else is ignored.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::diagnostic::DiagnosticRecord;
use crate::paths::{is_under_any, resolve_against};

// ---------------------------------------------------------------------------
// Budget
// ---------------------------------------------------------------------------

/// Maximum allowed occurrences per check name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct LimitBudget(BTreeMap<String, usize>);

impl LimitBudget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, rule: impl Into<String>, max: usize) -> Self {
        self.0.insert(rule.into(), max);
        self
    }

    pub fn limit(&self, rule: &str) -> Option<usize> {
        self.0.get(rule).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl From<BTreeMap<String, usize>> for LimitBudget {
    fn from(map: BTreeMap<String, usize>) -> Self {
        Self(map)
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Count for one budgeted check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleTally {
    pub rule: String,
    pub limit: usize,
    /// `path:line:col: severity: message` of each counted diagnostic.
    pub diagnostics: Vec<String>,
}

impl RuleTally {
    pub fn count(&self) -> usize {
        self.diagnostics.len()
    }

    /// Equality passes.
    pub fn within_limit(&self) -> bool {
        self.count() <= self.limit
    }

    /// Summary line, e.g. `bugprone-x: Exceed limit: (3 > 2)`.
    pub fn summary_line(&self) -> String {
        if self.within_limit() {
            format!("{}: Within limit: ({} <= {})", self.rule, self.count(), self.limit)
        } else {
            format!("{}: Exceed limit: ({} > {})", self.rule, self.count(), self.limit)
        }
    }
}

/// Outcome of checking a diagnostics set against a budget.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LimitReport {
    /// One tally per budgeted check, in check-name order.
    pub tallies: Vec<RuleTally>,
}

impl LimitReport {
    pub fn passed(&self) -> bool {
        self.tallies.iter().all(RuleTally::within_limit)
    }

    /// Tallies over budget.
    pub fn violations(&self) -> impl Iterator<Item = &RuleTally> {
        self.tallies.iter().filter(|t| !t.within_limit())
    }

    /// Log transcript: a summary line per check followed by its diagnostics, tab-indented.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for tally in &self.tallies {
            out.push_str(&tally.summary_line());
            out.push('\n');
            for diag in &tally.diagnostics {
                out.push('\t');
                out.push_str(diag);
                out.push('\n');
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Enforcer
// ---------------------------------------------------------------------------

/// Counts diagnostics per budgeted check, skipping excluded trees.
#[derive(Debug, Clone)]
pub struct LimitEnforcer {
    budget: LimitBudget,
    exclude_paths: Vec<PathBuf>,
    anchor: PathBuf,
}

impl LimitEnforcer {
    /// `exclude_paths` must already be resolved; relative diagnostic paths are
    /// resolved against `anchor` (the directory the tool ran in).
    pub fn new(budget: LimitBudget, exclude_paths: Vec<PathBuf>, anchor: impl Into<PathBuf>) -> Self {
        Self {
            budget,
            exclude_paths,
            anchor: anchor.into(),
        }
    }

    pub fn budget(&self) -> &LimitBudget {
        &self.budget
    }

    fn is_excluded(&self, path: &str) -> bool {
        if self.exclude_paths.is_empty() {
            return false;
        }
        let resolved = resolve_against(&self.anchor, Path::new(path));
        is_under_any(&resolved, &self.exclude_paths)
    }

    /// A diagnostic citing several checks counts once toward each budgeted one.
    pub fn evaluate(&self, diagnostics: &[DiagnosticRecord]) -> LimitReport {
        let mut buckets: BTreeMap<&str, Vec<String>> =
            self.budget.iter().map(|(rule, _)| (rule, Vec::new())).collect();

        for diag in diagnostics {
            let budgeted: Vec<&str> = diag
                .rules()
                .filter(|r| buckets.contains_key(r))
                .collect();
            if budgeted.is_empty() || self.is_excluded(&diag.path) {
                continue;
            }
            for rule in budgeted {
                if let Some(bucket) = buckets.get_mut(rule) {
                    bucket.push(diag.location_line());
                }
            }
        }

        let tallies = buckets
            .into_iter()
            .map(|(rule, diagnostics)| RuleTally {
                rule: rule.to_string(),
                limit: self.budget.limit(rule).unwrap_or(0),
                diagnostics,
            })
            .collect();

        LimitReport { tallies }
    }
}
