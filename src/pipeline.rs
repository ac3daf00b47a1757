//! The end-to-end check: select files, run engines, classify, decide the exit code.
//!
//! Ordering within one invocation is fixed: file selection completes before
//! any engine runs, classification happens after aggregation, and rendering
//! after classification.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{is_source_file, ProjectConfig};
use crate::error::{Result, EXIT_QUALITY_ISSUES, EXIT_SUCCESS};
use crate::quality::{
    CheckerResult, ClassificationRules, ClassifiedIssue, EngineContext, Issue, IssueClassifier,
    QualityCheckResult, ResultAggregator, Tier, Tool,
};
use crate::report::{reporter_for, ReportOptions};
use crate::selection::{FileSelector, FilterOptions};

/// What to check.
#[derive(Debug, Clone, Default)]
pub struct CheckRequest {
    /// Files or directories; empty means the whole project (or the staged /
    /// changed set when `staged` or `since` is given).
    pub files: Vec<PathBuf>,
    pub staged: bool,
    pub since: Option<String>,
    pub fix: bool,
    /// Fix auto-fixable errors in place, even without `fix`.
    pub silent_fix: bool,
    /// Overrides `respectGitignore` from the config when set.
    pub respect_gitignore: Option<bool>,
    pub correlation_id: Option<String>,
}

impl CheckRequest {
    /// A request for a single file.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            files: vec![path.into()],
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_silent_fix(mut self, silent_fix: bool) -> Self {
        self.silent_fix = silent_fix;
        self
    }
}

/// Result of one check plus everything derived from it.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub result: QualityCheckResult,
    pub classified: Vec<ClassifiedIssue>,
    pub files_checked: usize,
}

impl CheckOutcome {
    /// Errors that need an agent or a human.
    pub fn blocking_issues(&self) -> impl Iterator<Item = &ClassifiedIssue> {
        self.classified.iter().filter(|c| c.is_blocking())
    }

    /// `2` when a blocking issue was found, else `0`. Auto-fixable errors
    /// alone never block.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.blocking_issues().next().is_some() {
            EXIT_QUALITY_ISSUES
        } else {
            EXIT_SUCCESS
        }
    }

    /// Render with the reporter selected in `options`.
    #[must_use]
    pub fn render(&self, options: &ReportOptions) -> String {
        reporter_for(options).report(&self.result, &self.classified)
    }
}

/// Wires selection, engines and classification for one project.
pub struct QualityChecker {
    project_root: PathBuf,
    config: ProjectConfig,
    selector: FileSelector,
    aggregator: ResultAggregator,
    classifier: IssueClassifier,
}

impl QualityChecker {
    /// Load configuration and rules for `project_root` and build the engines.
    pub fn new(project_root: impl AsRef<Path>) -> Result<Self> {
        let root = project_root.as_ref();
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

        let config = ProjectConfig::load(&root)?;
        let rules = ClassificationRules::load(config.rules_path(&root).as_deref())?;
        let aggregator = ResultAggregator::from_config(&config, &root)?;

        Ok(Self::with_parts(
            &root,
            config,
            FileSelector::new(&root),
            aggregator,
            IssueClassifier::new(rules),
        ))
    }

    /// Assemble from explicit parts.
    #[must_use]
    pub fn with_parts(
        project_root: impl AsRef<Path>,
        config: ProjectConfig,
        selector: FileSelector,
        aggregator: ResultAggregator,
        classifier: IssueClassifier,
    ) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
            config,
            selector,
            aggregator,
            classifier,
        }
    }

    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    #[must_use]
    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    #[must_use]
    pub fn classifier(&self) -> &IssueClassifier {
        &self.classifier
    }

    /// Resolve the request to the absolute source files to check.
    pub fn select_files(&self, request: &CheckRequest) -> Vec<PathBuf> {
        let inputs = if !request.files.is_empty() {
            self.selector.expand_inputs(&request.files)
        } else if request.staged {
            self.selector.get_staged_files()
        } else if let Some(reference) = &request.since {
            self.selector.get_changed_files(reference)
        } else {
            self.selector.expand_inputs(&[self.project_root.clone()])
        };

        let opts = FilterOptions {
            staged_only: request.staged,
            since: request.since.clone(),
            respect_gitignore: request
                .respect_gitignore
                .unwrap_or(self.config.respect_gitignore),
        };

        let mut files = self.selector.filter_files(&inputs, &opts);
        files.retain(|f| is_source_file(f) && f.is_file());
        files
    }

    /// Run the full check for `request`.
    pub async fn check(&self, request: CheckRequest) -> CheckOutcome {
        let correlation_id = request
            .correlation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let files = self.select_files(&request);
        if files.is_empty() {
            info!("No files to check");
            return CheckOutcome {
                result: QualityCheckResult::new(Default::default(), 0, correlation_id),
                classified: Vec::new(),
                files_checked: 0,
            };
        }
        debug!("[{}] checking {} file(s)", correlation_id, files.len());

        let fix = request.fix || self.config.autofix;
        let ctx = EngineContext::new(&self.project_root).with_fix(fix);
        let mut result = self.aggregator.run(&ctx, &files, &correlation_id).await;
        let mut classified = self.classifier.classify_all(result.issues());

        if request.silent_fix && !fix {
            let (tools, fixable) = auto_fixable_targets(&classified);
            if !fixable.is_empty() {
                debug!(
                    "[{}] fixing {} file(s) with auto-fixable errors",
                    correlation_id,
                    fixable.len()
                );
                let fixed = self
                    .aggregator
                    .run_only(&tools, &ctx.clone().with_fix(true), &fixable, &correlation_id)
                    .await;
                result = supersede(&result, &fixed, &fixable);
                classified = self.classifier.classify_all(result.issues());
            }
        }

        CheckOutcome {
            result,
            classified,
            files_checked: files.len(),
        }
    }

    /// Check a single file as the hook does: auto-fixable errors are fixed
    /// in place.
    pub async fn check_file(&self, file: &Path, correlation_id: &str) -> CheckOutcome {
        self.check(
            CheckRequest::file(file)
                .with_correlation_id(correlation_id)
                .with_silent_fix(true),
        )
        .await
    }
}

/// Tools and files behind the auto-fixable errors in `classified`.
fn auto_fixable_targets(classified: &[ClassifiedIssue]) -> (Vec<Tool>, Vec<PathBuf>) {
    let mut tools = BTreeSet::new();
    let mut files = BTreeSet::new();
    for c in classified {
        if !c.issue.severity.is_blocking() || c.classification.tier() != Tier::AutoFixable {
            continue;
        }
        if let Some(file) = &c.issue.file {
            tools.insert(c.issue.tool);
            files.insert(file.clone());
        }
    }
    (tools.into_iter().collect(), files.into_iter().collect())
}

/// Replace what `first` says about `files` with the fix pass in `fixed`.
fn supersede(
    first: &QualityCheckResult,
    fixed: &QualityCheckResult,
    files: &[PathBuf],
) -> QualityCheckResult {
    let files: HashSet<&PathBuf> = files.iter().collect();
    let untouched = |issue: &&Issue| {
        issue
            .file
            .as_ref()
            .map(|f| !files.contains(f))
            .unwrap_or(false)
    };

    let mut checkers = first.checkers().clone();
    for (tool, after) in fixed.checkers() {
        if after.is_skipped() {
            continue;
        }
        let Some(before) = checkers.get(tool) else {
            continue;
        };

        let issues: Vec<Issue> = before
            .issues()
            .filter(|i| untouched(i))
            .cloned()
            .chain(after.issues().cloned())
            .collect();
        let mut merged = CheckerResult::from_issues(issues);
        merged.autofixes = before
            .autofixes
            .iter()
            .chain(&after.autofixes)
            .cloned()
            .collect();
        merged.pre_fix = after.pre_fix.clone();
        merged.duration = match (before.duration, after.duration) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };
        checkers.insert(*tool, merged);
    }

    QualityCheckResult::new(
        checkers,
        first.duration() + fixed.duration(),
        first.correlation_id(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as QcResult;
    use crate::quality::{AggregatorConfig, CheckerResult, Engine, Issue, Tool};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct FlagVarEngine;

    impl Engine for FlagVarEngine {
        fn tool(&self) -> Tool {
            Tool::Lint
        }

        fn check(&self, _ctx: &EngineContext, files: &[PathBuf]) -> QcResult<CheckerResult> {
            let mut issues = Vec::new();
            for file in files {
                let content = std::fs::read_to_string(file)?;
                if content.contains("var ") {
                    issues.push(
                        Issue::error(Tool::Lint, "Unexpected var.")
                            .with_location(file, 1, 1)
                            .with_rule("no-var"),
                    );
                }
            }
            Ok(CheckerResult::from_issues(issues))
        }
    }

    /// Flags tab indentation; rewrites it to spaces when fixing.
    struct SpacingEngine;

    impl Engine for SpacingEngine {
        fn tool(&self) -> Tool {
            Tool::Format
        }

        fn check(&self, ctx: &EngineContext, files: &[PathBuf]) -> QcResult<CheckerResult> {
            let mut issues = Vec::new();
            let mut autofixes = Vec::new();
            for file in files {
                let content = std::fs::read_to_string(file)?;
                if !content.contains('\t') {
                    continue;
                }
                if ctx.fix {
                    std::fs::write(file, content.replace('\t', "  "))?;
                    autofixes.push(format!("formatted {}", ctx.relative(file).display()));
                } else {
                    issues.push(
                        Issue::error(Tool::Format, "File is not formatted")
                            .with_file(file)
                            .with_rule("prettier/prettier"),
                    );
                }
            }
            let mut result = CheckerResult::from_issues(issues);
            result.autofixes = autofixes;
            Ok(result)
        }
    }

    fn shared(engine: impl Engine + 'static) -> Arc<dyn Engine> {
        Arc::new(engine)
    }

    fn checker(root: &Path) -> QualityChecker {
        checker_with(root, vec![shared(FlagVarEngine)])
    }

    fn checker_with(root: &Path, engines: Vec<Arc<dyn Engine>>) -> QualityChecker {
        let aggregator = engines.into_iter().fold(
            ResultAggregator::new(AggregatorConfig::default()),
            ResultAggregator::with_engine,
        );
        QualityChecker::with_parts(
            root,
            ProjectConfig::default(),
            FileSelector::new(root).without_git(),
            aggregator,
            IssueClassifier::default(),
        )
    }

    fn project() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::write(root.join("src/good.ts"), "export const a = 1;\n").unwrap();
        std::fs::write(root.join("src/bad.ts"), "var a = 1;\n").unwrap();
        std::fs::write(root.join("src/notes.md"), "var in prose\n").unwrap();
        std::fs::write(root.join("node_modules/pkg/index.js"), "var x;\n").unwrap();
        temp
    }

    #[test]
    fn test_select_whole_project_skips_vendor_and_non_source() {
        let temp = project();
        let root = temp.path().canonicalize().unwrap();
        let files = checker(&root).select_files(&CheckRequest::default());

        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.extension().unwrap() == "ts"));
    }

    #[tokio::test]
    async fn test_clean_file_exits_zero() {
        let temp = project();
        let root = temp.path().canonicalize().unwrap();
        let outcome = checker(&root)
            .check_file(&root.join("src/good.ts"), "corr")
            .await;

        assert!(outcome.result.success());
        assert_eq!(outcome.exit_code(), EXIT_SUCCESS);
        assert_eq!(outcome.result.correlation_id(), "corr");
        assert_eq!(outcome.files_checked, 1);
    }

    #[tokio::test]
    async fn test_issue_exits_two_and_is_classified() {
        let temp = project();
        let root = temp.path().canonicalize().unwrap();
        let outcome = checker(&root)
            .check_file(&root.join("src/bad.ts"), "corr")
            .await;

        assert_eq!(outcome.exit_code(), EXIT_QUALITY_ISSUES);
        assert_eq!(outcome.classified.len(), 1);
        assert_eq!(
            outcome.classified[0].classification.tier(),
            crate::quality::Tier::AgentFixable
        );
    }

    #[tokio::test]
    async fn test_nothing_to_check_is_success() {
        let temp = project();
        let root = temp.path().canonicalize().unwrap();
        let outcome = checker(&root)
            .check(CheckRequest::file(root.join("src/notes.md")))
            .await;

        assert_eq!(outcome.files_checked, 0);
        assert_eq!(outcome.exit_code(), EXIT_SUCCESS);
        assert_eq!(outcome.render(&ReportOptions::default()), "");
    }

    #[tokio::test]
    async fn test_generated_correlation_id() {
        let temp = project();
        let root = temp.path().canonicalize().unwrap();
        let outcome = checker(&root).check(CheckRequest::default()).await;
        assert_eq!(outcome.result.correlation_id().len(), 36);
    }

    #[tokio::test]
    async fn test_auto_fixable_errors_do_not_block() {
        let temp = project();
        let root = temp.path().canonicalize().unwrap();
        std::fs::write(root.join("src/tabs.ts"), "export function f() {\n\treturn 1;\n}\n").unwrap();

        let outcome = checker_with(&root, vec![shared(SpacingEngine)])
            .check(CheckRequest::file(root.join("src/tabs.ts")))
            .await;

        assert!(!outcome.result.success());
        assert_eq!(outcome.classified.len(), 1);
        assert_eq!(outcome.classified[0].classification.tier(), Tier::AutoFixable);
        assert_eq!(outcome.exit_code(), EXIT_SUCCESS);
        assert!(std::fs::read_to_string(root.join("src/tabs.ts")).unwrap().contains('\t'));
    }

    #[tokio::test]
    async fn test_check_file_fixes_formatting_in_place() {
        let temp = project();
        let root = temp.path().canonicalize().unwrap();
        let file = root.join("src/tabs.ts");
        std::fs::write(&file, "export function f() {\n\treturn 1;\n}\n").unwrap();

        let outcome = checker_with(&root, vec![shared(SpacingEngine)])
            .check_file(&file, "corr")
            .await;

        assert_eq!(outcome.exit_code(), EXIT_SUCCESS);
        assert!(outcome.result.success());
        assert!(outcome.classified.is_empty());
        assert_eq!(
            std::fs::read_to_string(&file).unwrap(),
            "export function f() {\n  return 1;\n}\n"
        );
        let format = &outcome.result.checkers()[&Tool::Format];
        assert_eq!(format.autofixes, vec!["formatted src/tabs.ts".to_string()]);
        assert_eq!(outcome.render(&ReportOptions::default()), "");
    }

    #[tokio::test]
    async fn test_check_file_still_blocks_on_agent_fixable_issues() {
        let temp = project();
        let root = temp.path().canonicalize().unwrap();
        let file = root.join("src/mixed.ts");
        std::fs::write(&file, "var a = 1;\n\texport { a };\n").unwrap();

        let outcome = checker_with(&root, vec![shared(FlagVarEngine), shared(SpacingEngine)])
            .check_file(&file, "corr")
            .await;

        assert_eq!(outcome.exit_code(), EXIT_QUALITY_ISSUES);
        assert!(!std::fs::read_to_string(&file).unwrap().contains('\t'));
        assert_eq!(outcome.classified.len(), 1);
        assert_eq!(outcome.classified[0].issue.rule_key(), Some("no-var"));
        assert!(outcome.result.checkers()[&Tool::Format].success);
        assert_eq!(outcome.blocking_issues().count(), 1);
    }

    #[tokio::test]
    async fn test_explicit_fix_skips_the_second_pass() {
        let temp = project();
        let root = temp.path().canonicalize().unwrap();
        let file = root.join("src/tabs.ts");
        std::fs::write(&file, "\tlet x = 1;\n").unwrap();

        let outcome = checker_with(&root, vec![shared(SpacingEngine)])
            .check(
                CheckRequest {
                    fix: true,
                    ..CheckRequest::file(&file)
                }
                .with_silent_fix(true),
            )
            .await;

        assert_eq!(outcome.exit_code(), EXIT_SUCCESS);
        assert_eq!(outcome.result.checkers()[&Tool::Format].autofixes.len(), 1);
    }
}
