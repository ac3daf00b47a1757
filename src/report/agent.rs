//! Agent-facing reporter.
//!
//! The reporter owns no grammar of its own. It hands the classified issues to
//! an [`AgentFormatter`] and returns whatever that produces. The default
//! [`StructuredFormatter`] emits a small XML-like document an agent can parse
//! reliably.

use std::path::PathBuf;

use super::{display_path, AgentMode, Reporter};
use crate::quality::{Classification, ClassifiedIssue, QualityCheckResult, Severity, Tier};

/// Formatting collaborator for agent output.
pub trait AgentFormatter: Send + Sync {
    fn format(&self, issues: &[ClassifiedIssue], mode: AgentMode) -> String;
}

/// Delegates to an [`AgentFormatter`].
pub struct AgentReporter {
    formatter: Box<dyn AgentFormatter>,
    mode: AgentMode,
}

impl AgentReporter {
    #[must_use]
    pub fn new(formatter: Box<dyn AgentFormatter>, mode: AgentMode) -> Self {
        Self { formatter, mode }
    }
}

impl Reporter for AgentReporter {
    fn report(&self, result: &QualityCheckResult, classified: &[ClassifiedIssue]) -> String {
        if result.issues().is_empty() || classified.is_empty() {
            return String::new();
        }
        self.formatter.format(classified, self.mode)
    }
}

// ============================================================================
// Structured formatter
// ============================================================================

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// XML-like output:
///
/// ```text
/// <quality-check status="blocked" errors="1" warnings="0">
/// <issue tier="agent-fixable" action="block-and-instruct" file="src/a.ts" line="3" rule="no-var">
///   <message>Unexpected var.</message>
///   <instruction>Declare the variable with `let` or `const`.</instruction>
/// </issue>
/// </quality-check>
/// ```
#[derive(Debug, Clone, Default)]
pub struct StructuredFormatter {
    root: Option<PathBuf>,
}

impl StructuredFormatter {
    #[must_use]
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    fn open_tag(&self, item: &ClassifiedIssue) -> String {
        let issue = &item.issue;
        let mut tag = format!(
            "<issue tool=\"{}\" severity=\"{}\" tier=\"{}\" action=\"{}\"",
            issue.tool,
            issue.severity,
            item.classification.tier(),
            item.classification.action()
        );
        if let Some(file) = &issue.file {
            tag.push_str(&format!(
                " file=\"{}\"",
                escape(&display_path(file, self.root.as_deref()))
            ));
        }
        if let Some(line) = issue.line {
            tag.push_str(&format!(" line=\"{line}\""));
        }
        if let Some(col) = issue.col {
            tag.push_str(&format!(" col=\"{col}\""));
        }
        if let Some(rule) = issue.rule_key() {
            tag.push_str(&format!(" rule=\"{}\"", escape(rule)));
        }
        tag.push('>');
        tag
    }

    fn format_issue(&self, item: &ClassifiedIssue, detailed: bool) -> String {
        let mut out = self.open_tag(item);
        out.push('\n');
        out.push_str(&format!(
            "  <message>{}</message>\n",
            escape(&item.issue.message)
        ));

        match &item.classification {
            Classification::AutoFixable => {}
            Classification::AgentFixable(r) => {
                out.push_str(&format!(
                    "  <instruction>{}</instruction>\n",
                    escape(&r.instruction)
                ));
                if detailed {
                    out.push_str(&format!("  <before>{}</before>\n", escape(&r.before)));
                    out.push_str(&format!("  <after>{}</after>\n", escape(&r.after)));
                }
            }
            Classification::HumanRequired(e) => {
                out.push_str(&format!("  <concern>{}</concern>\n", escape(&e.concern)));
                out.push_str(&format!("  <next-step>{}</next-step>\n", escape(&e.next_step)));
                if detailed {
                    out.push_str(&format!(
                        "  <learn-more>{}</learn-more>\n",
                        escape(&e.learn_more)
                    ));
                }
            }
        }

        out.push_str("</issue>\n");
        out
    }
}

impl AgentFormatter for StructuredFormatter {
    fn format(&self, issues: &[ClassifiedIssue], mode: AgentMode) -> String {
        if issues.is_empty() {
            return String::new();
        }

        let errors = issues
            .iter()
            .filter(|i| i.issue.severity == Severity::Error)
            .count();
        let status = if issues.iter().any(ClassifiedIssue::is_blocking) {
            "blocked"
        } else {
            "warnings"
        };

        let mut out = format!(
            "<quality-check status=\"{}\" errors=\"{}\" warnings=\"{}\">\n",
            status,
            errors,
            issues.len() - errors
        );

        let count = |tier: Tier| {
            issues
                .iter()
                .filter(|i| i.classification.tier() == tier)
                .count()
        };
        out.push_str(&format!(
            "<summary auto-fixable=\"{}\" agent-fixable=\"{}\" human-required=\"{}\"/>\n",
            count(Tier::AutoFixable),
            count(Tier::AgentFixable),
            count(Tier::HumanRequired)
        ));

        match mode {
            AgentMode::Summary => {}
            AgentMode::Default => {
                for item in issues
                    .iter()
                    .filter(|i| i.classification.tier() != Tier::AutoFixable)
                {
                    out.push_str(&self.format_issue(item, false));
                }
            }
            AgentMode::Detailed => {
                for item in issues {
                    out.push_str(&self.format_issue(item, true));
                }
            }
        }

        out.push_str("</quality-check>\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::{CheckerResult, Issue, IssueClassifier, Tool};
    use std::collections::BTreeMap;

    fn fixture() -> (QualityCheckResult, Vec<ClassifiedIssue>) {
        let issues = vec![
            Issue::error(Tool::Format, "File is not formatted")
                .with_file("/proj/src/a.ts")
                .with_rule("prettier/prettier"),
            Issue::error(Tool::Lint, "Unexpected var.")
                .with_location("/proj/src/a.ts", 3, 1)
                .with_rule("no-var"),
            Issue::warning(Tool::Lint, "Too complex <10>")
                .with_location("/proj/src/b.ts", 1, 1)
                .with_rule("complexity"),
        ];
        let mut checkers = BTreeMap::new();
        checkers.insert(Tool::Lint, CheckerResult::from_issues(issues[1..].to_vec()));
        checkers.insert(Tool::Format, CheckerResult::from_issues(issues[..1].to_vec()));
        let result = QualityCheckResult::new(checkers, 1, "id");
        let classified = IssueClassifier::default().classify_all(result.issues());
        (result, classified)
    }

    fn reporter(mode: AgentMode) -> AgentReporter {
        AgentReporter::new(
            Box::new(StructuredFormatter::new(Some(PathBuf::from("/proj")))),
            mode,
        )
    }

    #[test]
    fn test_summary_mode_counts_only() {
        let (result, classified) = fixture();
        let output = reporter(AgentMode::Summary).report(&result, &classified);
        assert!(output.contains("status=\"blocked\""));
        assert!(output.contains("auto-fixable=\"1\" agent-fixable=\"1\" human-required=\"1\""));
        assert!(!output.contains("<issue"));
    }

    #[test]
    fn test_default_mode_hides_auto_fixable() {
        let (result, classified) = fixture();
        let output = reporter(AgentMode::Default).report(&result, &classified);
        assert!(!output.contains("tier=\"auto-fixable\""));
        assert!(output.contains("rule=\"no-var\""));
        assert!(output.contains("<instruction>"));
        assert!(output.contains("<next-step>"));
        assert!(!output.contains("<before>"));
        assert!(output.contains("file=\"src/a.ts\""));
    }

    #[test]
    fn test_detailed_mode_includes_examples_and_escapes() {
        let (result, classified) = fixture();
        let output = reporter(AgentMode::Detailed).report(&result, &classified);
        assert!(output.contains("tier=\"auto-fixable\""));
        assert!(output.contains("<before>"));
        assert!(output.contains("<learn-more>"));
        assert!(output.contains("Too complex &lt;10&gt;"));
    }

    #[test]
    fn test_auto_fixable_errors_alone_are_not_blocked() {
        let issue = Issue::error(Tool::Format, "File is not formatted")
            .with_file("/proj/src/a.ts")
            .with_rule("prettier/prettier");
        let mut checkers = BTreeMap::new();
        checkers.insert(Tool::Format, CheckerResult::from_issues(vec![issue]));
        let result = QualityCheckResult::new(checkers, 1, "id");
        let classified = IssueClassifier::default().classify_all(result.issues());
        let output = reporter(AgentMode::Summary).report(&result, &classified);
        assert!(output.contains("status=\"warnings\" errors=\"1\""));
    }

    struct CountingFormatter;

    impl AgentFormatter for CountingFormatter {
        fn format(&self, issues: &[ClassifiedIssue], _mode: AgentMode) -> String {
            format!("{} issue(s)", issues.len())
        }
    }

    #[test]
    fn test_reporter_delegates_to_formatter() {
        let (result, classified) = fixture();
        let reporter = AgentReporter::new(Box::new(CountingFormatter), AgentMode::Default);
        assert_eq!(reporter.report(&result, &classified), "3 issue(s)");
    }
}
