//! Colored terminal reporter.

use std::path::PathBuf;

use colored::*;

use super::{display_path, Reporter};
use crate::quality::{ClassifiedIssue, Issue, QualityCheckResult, Severity, Tool};

/// Groups issues by tool, either one line per issue or a verbose block.
#[derive(Debug, Clone)]
pub struct CliReporter {
    max_items: usize,
    verbose: bool,
    root: Option<PathBuf>,
}

impl Default for CliReporter {
    fn default() -> Self {
        Self {
            max_items: 20,
            verbose: false,
            root: None,
        }
    }
}

impl CliReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum issues shown per tool; `0` means no limit.
    #[must_use]
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    #[must_use]
    pub fn with_root(mut self, root: Option<PathBuf>) -> Self {
        self.root = root;
        self
    }

    fn location(&self, issue: &Issue) -> String {
        let Some(file) = &issue.file else {
            return "(project)".to_string();
        };
        let path = display_path(file, self.root.as_deref());
        match (issue.line, issue.col) {
            (Some(line), Some(col)) => format!("{path}:{line}:{col}"),
            (Some(line), None) => format!("{path}:{line}"),
            _ => path,
        }
    }

    fn severity_label(severity: Severity) -> ColoredString {
        match severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
        }
    }

    fn format_issue(&self, issue: &Issue) -> String {
        let rule = issue
            .rule_key()
            .map(|r| format!(" [{}]", r).dimmed().to_string())
            .unwrap_or_default();

        if self.verbose {
            format!(
                "  {} {}\n    {}{}\n",
                Self::severity_label(issue.severity),
                self.location(issue).cyan(),
                issue.message,
                rule
            )
        } else {
            let first_line = issue.message.lines().next().unwrap_or("");
            format!(
                "  {} {} {}{}\n",
                Self::severity_label(issue.severity),
                self.location(issue).cyan(),
                first_line,
                rule
            )
        }
    }
}

impl Reporter for CliReporter {
    fn report(&self, result: &QualityCheckResult, _classified: &[ClassifiedIssue]) -> String {
        if result.issues().is_empty() {
            return String::new();
        }

        let mut output = String::new();

        for tool in Tool::ALL {
            let issues: Vec<&Issue> = result.issues_for(tool).collect();
            if issues.is_empty() {
                continue;
            }

            let errors = issues.iter().filter(|i| i.severity.is_blocking()).count();
            let warnings = issues.len() - errors;
            output.push_str(&format!(
                "{} {}\n",
                tool.display_name().bold(),
                format!("({} error(s), {} warning(s))", errors, warnings).dimmed()
            ));

            let limit = if self.max_items == 0 {
                issues.len()
            } else {
                self.max_items.min(issues.len())
            };
            for issue in &issues[..limit] {
                output.push_str(&self.format_issue(issue));
            }
            if issues.len() > limit {
                output.push_str(&format!("  … and {} more\n", issues.len() - limit));
            }
            output.push('\n');
        }

        if !result.autofixes().is_empty() {
            output.push_str(&format!("{}\n", "Autofixes applied:".green().bold()));
            for fix in result.autofixes() {
                output.push_str(&format!("  {} {}\n", "✓".green(), fix));
            }
            output.push('\n');
        }

        let errors = result.count_by_severity(Severity::Error);
        let warnings = result.count_by_severity(Severity::Warning);
        let summary = format!(
            "{} error(s), {} warning(s) in {}ms",
            errors,
            warnings,
            result.duration()
        );
        if result.success() {
            output.push_str(&format!("{} {}\n", "⚠".yellow(), summary));
        } else {
            output.push_str(&format!("{} {}\n", "✖".red().bold(), summary));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::CheckerResult;
    use std::collections::BTreeMap;

    fn result_with(issues: Vec<Issue>) -> QualityCheckResult {
        let mut checkers = BTreeMap::new();
        for issue in issues {
            checkers
                .entry(issue.tool)
                .or_insert_with(CheckerResult::pass)
                .errors
                .push(issue);
        }
        QualityCheckResult::new(checkers, 5, "id")
    }

    #[test]
    fn test_groups_by_tool() {
        let result = result_with(vec![
            Issue::error(Tool::Type, "Type mismatch").with_location("/proj/src/a.ts", 3, 7),
            Issue::error(Tool::Lint, "Unexpected var.").with_rule("no-var"),
        ]);
        let output = CliReporter::new()
            .with_root(Some(PathBuf::from("/proj")))
            .report(&result, &[]);

        assert!(output.contains("TypeScript"));
        assert!(output.contains("ESLint"));
        assert!(!output.contains("Prettier"));
        assert!(output.contains("src/a.ts:3:7"));
        assert!(output.contains("Unexpected var."));
        assert!(output.find("TypeScript").unwrap() < output.find("ESLint").unwrap());
    }

    #[test]
    fn test_internal_failure_is_not_grouped_under_an_engine() {
        let result = QualityCheckResult::internal_failure("config is broken", "id");
        let output = CliReporter::new().report(&result, &[]);

        assert!(output.contains("quality-check"));
        assert!(output.contains("config is broken"));
        assert!(!output.contains("TypeScript"));
    }

    #[test]
    fn test_max_items_tail() {
        let issues = (0..5)
            .map(|i| Issue::error(Tool::Lint, format!("issue {i}")))
            .collect();
        let output = CliReporter::new().with_max_items(2).report(&result_with(issues), &[]);

        assert!(output.contains("issue 0"));
        assert!(output.contains("issue 1"));
        assert!(!output.contains("issue 2"));
        assert!(output.contains("… and 3 more"));
    }

    #[test]
    fn test_verbose_keeps_full_message() {
        let result = result_with(vec![Issue::error(Tool::Type, "first line\nsecond line")]);

        let compact = CliReporter::new().report(&result, &[]);
        assert!(!compact.contains("second line"));

        let verbose = CliReporter::new().with_verbose(true).report(&result, &[]);
        assert!(verbose.contains("second line"));
    }

    #[test]
    fn test_project_wide_issue_location() {
        let result = result_with(vec![Issue::error(Tool::Type, "bad config").with_code("TS5023")]);
        let output = CliReporter::new().report(&result, &[]);
        assert!(output.contains("(project)"));
    }
}
