//! Canonical issue model shared by every engine.
//!
//! Each engine normalizes its native diagnostics into [`Issue`] and returns a
//! [`CheckerResult`]. The aggregator folds those into one immutable
//! [`QualityCheckResult`] per invocation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Rule id for failures of the checker itself.
pub const INTERNAL_ERROR_RULE: &str = "quality-check/internal-error";

// ============================================================================
// Tool & Severity
// ============================================================================

/// The engine that produced an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Type checker (tsc).
    Type,
    /// Lint engine (eslint).
    Lint,
    /// Formatter (prettier).
    Format,
    /// The checker itself, for failures outside any engine.
    Internal,
}

impl Tool {
    /// All tools in reporting order.
    pub const ALL: [Tool; 4] = [Tool::Type, Tool::Lint, Tool::Format, Tool::Internal];

    /// Lowercase identifier used on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Lint => "lint",
            Self::Format => "format",
            Self::Internal => "internal",
        }
    }

    /// Human-facing name of the wrapped tool.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Type => "TypeScript",
            Self::Lint => "ESLint",
            Self::Format => "Prettier",
            Self::Internal => "quality-check",
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity level for quality issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Should be fixed but doesn't block.
    Warning,
    /// Blocks the change.
    Error,
}

impl Severity {
    /// Check if this severity blocks the change.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Error)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

// ============================================================================
// Issue
// ============================================================================

/// A single tool-agnostic diagnostic.
///
/// `file`, `line` and `col` are only absent for project-wide diagnostics such
/// as a broken configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub tool: Tool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col: Option<u32>,
    /// Native diagnostic code (e.g. `TS2322`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Rule identifier (e.g. `no-unused-vars`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    pub severity: Severity,
    pub message: String,
}

impl Issue {
    /// Create a new project-wide issue.
    pub fn new(tool: Tool, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            tool,
            file: None,
            line: None,
            col: None,
            code: None,
            rule_id: None,
            severity,
            message: message.into(),
        }
    }

    /// Shorthand for an error-severity issue.
    pub fn error(tool: Tool, message: impl Into<String>) -> Self {
        Self::new(tool, Severity::Error, message)
    }

    /// Shorthand for a warning-severity issue.
    pub fn warning(tool: Tool, message: impl Into<String>) -> Self {
        Self::new(tool, Severity::Warning, message)
    }

    /// Attach a file without a position.
    #[must_use]
    pub fn with_file(mut self, file: impl AsRef<Path>) -> Self {
        self.file = Some(file.as_ref().to_path_buf());
        self
    }

    /// Add a file location.
    #[must_use]
    pub fn with_location(mut self, file: impl AsRef<Path>, line: u32, col: u32) -> Self {
        self.file = Some(file.as_ref().to_path_buf());
        self.line = Some(line);
        self.col = Some(col);
        self
    }

    /// Add a native diagnostic code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Add a rule identifier.
    #[must_use]
    pub fn with_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    /// Key used by the classifier: rule id, else code.
    #[must_use]
    pub fn rule_key(&self) -> Option<&str> {
        self.rule_id.as_deref().or(self.code.as_deref())
    }

    /// `file:line:col` when a location is known.
    #[must_use]
    pub fn location(&self) -> Option<String> {
        let file = self.file.as_ref()?;
        Some(match (self.line, self.col) {
            (Some(line), Some(col)) => format!("{}:{}:{}", file.display(), line, col),
            (Some(line), None) => format!("{}:{}", file.display(), line),
            _ => file.display().to_string(),
        })
    }
}

// ============================================================================
// Per-engine result
// ============================================================================

/// Outcome of one engine run. Owned by its engine; the aggregator only reads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckerResult {
    pub success: bool,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
    pub autofixes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    /// Diagnostics seen before an autofix attempt that did not close every issue.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_fix: Vec<Issue>,
    /// Why the engine did not run, when it was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

impl CheckerResult {
    /// Build a result from a flat list of issues, splitting by severity.
    pub fn from_issues(issues: Vec<Issue>) -> Self {
        let (errors, warnings): (Vec<_>, Vec<_>) =
            issues.into_iter().partition(|i| i.severity.is_blocking());
        Self {
            success: errors.is_empty(),
            errors,
            warnings,
            ..Default::default()
        }
    }

    /// A passing result with no diagnostics.
    pub fn pass() -> Self {
        Self::from_issues(Vec::new())
    }

    /// A soft skip: the engine was not applicable or not available.
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            success: true,
            skipped: Some(reason.into()),
            ..Default::default()
        }
    }

    /// Record an autofix marker.
    #[must_use]
    pub fn with_autofix(mut self, marker: impl Into<String>) -> Self {
        self.autofixes.push(marker.into());
        self
    }

    /// Record the diagnostics that preceded a partial fix.
    #[must_use]
    pub fn with_pre_fix(mut self, issues: Vec<Issue>) -> Self {
        self.pre_fix = issues;
        self
    }

    /// Add duration.
    #[must_use]
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration = Some(duration_ms);
        self
    }

    /// All issues, errors first.
    pub fn issues(&self) -> impl Iterator<Item = &Issue> {
        self.errors.iter().chain(self.warnings.iter())
    }

    /// Whether the engine was skipped.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }
}

// ============================================================================
// Aggregated result
// ============================================================================

/// The single result of one invocation. Immutable after construction.
///
/// Field order is the wire order of the JSON reporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityCheckResult {
    success: bool,
    duration: u64,
    issues: Vec<Issue>,
    checkers: BTreeMap<Tool, CheckerResult>,
    correlation_id: String,
    autofixes: Vec<String>,
}

impl QualityCheckResult {
    /// Fold per-engine results into one result.
    ///
    /// `success` is true iff no issue has severity `error`.
    pub fn new(
        checkers: BTreeMap<Tool, CheckerResult>,
        duration_ms: u64,
        correlation_id: impl Into<String>,
    ) -> Self {
        let issues: Vec<Issue> = checkers
            .values()
            .flat_map(|c| c.issues().cloned())
            .collect();
        let autofixes = checkers
            .values()
            .flat_map(|c| c.autofixes.iter().cloned())
            .collect();
        let success = issues.iter().all(|i| !i.severity.is_blocking());

        Self {
            success,
            duration: duration_ms,
            issues,
            checkers,
            correlation_id: correlation_id.into(),
            autofixes,
        }
    }

    /// A failure result for an internal error caught at the outer boundary.
    pub fn internal_failure(message: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        let mut result = Self::new(BTreeMap::new(), 0, correlation_id);
        result.success = false;
        result.issues.push(
            Issue::error(Tool::Internal, message).with_rule(INTERNAL_ERROR_RULE),
        );
        result
    }

    /// Re-stamp the wall-clock duration measured by the caller.
    #[must_use]
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration = duration_ms;
        self
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.success
    }

    #[must_use]
    pub fn duration(&self) -> u64 {
        self.duration
    }

    #[must_use]
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    #[must_use]
    pub fn checkers(&self) -> &BTreeMap<Tool, CheckerResult> {
        &self.checkers
    }

    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    #[must_use]
    pub fn autofixes(&self) -> &[String] {
        &self.autofixes
    }

    /// Count issues by severity.
    #[must_use]
    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    /// Issues produced by one tool.
    pub fn issues_for(&self, tool: Tool) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.tool == tool)
    }
}
