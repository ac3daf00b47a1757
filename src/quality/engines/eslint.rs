//! Lint engine backed by `eslint --format json`.
//!
//! Two behaviours go beyond plain linting:
//!
//! - **Stub synthesis**: when a test file imports a relative module that does
//!   not exist yet, a minimal stub matching the imported names is created so
//!   test-first work is not blocked, and the file is linted once more.
//! - **Underscore heuristic**: an unused `_name` that is not a catch binding,
//!   destructuring placeholder or parameter gets an extra warning suggesting
//!   deletion. It never blocks on its own.

use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{resolve_binary, run_tool, soft_skip, Engine, EngineContext};
use crate::config::{is_source_file, EslintConfig, SOURCE_EXTENSIONS};
use crate::error::{QualityError, Result};
use crate::quality::issue::{CheckerResult, Issue, Severity, Tool};

/// Rule attached to the underscore dead-code warning.
pub const DEAD_CODE_RULE: &str = "quality-check/no-underscore-dead-code";

/// Rule attached to an eslint configuration failure.
pub const CONFIG_ERROR_RULE: &str = "eslint/config-error";

const UNRESOLVED_RULES: &[&str] = &[
    "import/no-unresolved",
    "n/no-missing-import",
    "node/no-missing-import",
];

const UNUSED_RULES: &[&str] = &["no-unused-vars", "@typescript-eslint/no-unused-vars"];

const MISSING_CONFIG_MARKERS: &[&str] = &[
    "No ESLint configuration found",
    "couldn't find an eslint.config",
    "couldn't find a configuration file",
];

fn specifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"['"](\.{1,2}/[^'"]+)['"]"#).expect("valid regex"))
}

fn declaration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:export\s+)?(?:const|let|var)\s+").expect("valid regex")
    })
}

fn underscore_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"'(_[A-Za-z0-9_$]*)'").expect("valid regex"))
}

// ============================================================================
// eslint JSON output
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EslintFileResult {
    pub file_path: PathBuf,
    #[serde(default)]
    pub messages: Vec<EslintMessage>,
    /// Fixed source, present only with `--fix-dry-run` when something changed.
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EslintMessage {
    #[serde(default)]
    pub rule_id: Option<String>,
    pub severity: u8,
    pub message: String,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub column: Option<u32>,
    #[serde(default)]
    pub fatal: bool,
}

impl EslintMessage {
    fn is_ignored_notice(&self) -> bool {
        self.rule_id.is_none() && self.message.starts_with("File ignored")
    }
}

enum LintRun {
    Results(Vec<EslintFileResult>),
    ConfigError(String),
}

/// Normalize eslint results into issues, dropping "file ignored" notices.
pub(crate) fn to_issues(results: &[EslintFileResult]) -> Vec<Issue> {
    let mut issues = Vec::new();
    for result in results {
        for msg in result.messages.iter().filter(|m| !m.is_ignored_notice()) {
            let severity = if msg.severity >= 2 || msg.fatal {
                Severity::Error
            } else {
                Severity::Warning
            };
            let mut issue = Issue::new(Tool::Lint, severity, msg.message.trim()).with_location(
                &result.file_path,
                msg.line.unwrap_or(1),
                msg.column.unwrap_or(1),
            );
            if let Some(rule) = &msg.rule_id {
                issue = issue.with_rule(rule);
            }
            issues.push(issue);
        }
    }
    issues
}

// ============================================================================
// Stub synthesis
// ============================================================================

/// Names a test file imports from one specifier.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct ExportShape {
    pub default: Option<String>,
    pub named: Vec<String>,
    pub types: Vec<String>,
}

impl ExportShape {
    fn is_empty(&self) -> bool {
        self.default.is_none() && self.named.is_empty() && self.types.is_empty()
    }
}

/// Relative specifier named by an unresolved-import diagnostic.
fn unresolved_specifier(msg: &EslintMessage) -> Option<String> {
    let by_rule = msg
        .rule_id
        .as_deref()
        .map(|r| UNRESOLVED_RULES.contains(&r))
        .unwrap_or(false);
    let by_message = msg.message.contains("Cannot find module")
        || msg.message.contains("Unable to resolve path to module");
    if !by_rule && !by_message {
        return None;
    }
    specifier_re()
        .captures(&msg.message)
        .map(|c| c[1].to_string())
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut s = base.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

fn lexical_join(dir: &Path, specifier: &str) -> PathBuf {
    let mut out = PathBuf::new();
    for component in dir.join(specifier).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Whether `base` resolves to an existing module under any source extension.
fn module_exists(base: &Path) -> bool {
    base.is_file()
        || SOURCE_EXTENSIONS.iter().any(|ext| {
            with_suffix(base, &format!(".{ext}")).is_file()
                || base.join(format!("index.{ext}")).is_file()
        })
}

fn stub_extension(test_file: &Path) -> &'static str {
    match test_file.extension().and_then(|e| e.to_str()) {
        Some("ts") | Some("tsx") => "ts",
        Some("mts") => "mts",
        Some("cts") => "cts",
        Some("mjs") => "mjs",
        Some("cjs") => "cjs",
        _ => "js",
    }
}

/// Where a stub for `specifier` imported by `test_file` would go, if one is needed.
pub(crate) fn stub_target(test_file: &Path, specifier: &str, project_root: &Path) -> Option<PathBuf> {
    if !specifier.starts_with("./") && !specifier.starts_with("../") {
        return None;
    }
    let base = lexical_join(test_file.parent()?, specifier);
    if !base.starts_with(project_root) || module_exists(&base) {
        return None;
    }
    if is_source_file(&base) {
        return Some(base);
    }
    Some(with_suffix(&base, &format!(".{}", stub_extension(test_file))))
}

/// Read the import clause for `specifier` out of the test source.
pub(crate) fn infer_exports(source: &str, specifier: &str) -> ExportShape {
    let pattern = format!(
        r#"import\s+(type\s+)?([^;'"]*?)\s+from\s+['"]{}['"]"#,
        regex::escape(specifier)
    );
    let Ok(re) = Regex::new(&pattern) else {
        return ExportShape::default();
    };

    let mut shape = ExportShape::default();
    for caps in re.captures_iter(source) {
        let type_only = caps.get(1).is_some();
        let clause = caps[2].trim();

        let (head, braces) = match clause.find('{') {
            Some(start) => {
                let end = clause.rfind('}').unwrap_or(clause.len());
                (&clause[..start], Some(&clause[start + 1..end]))
            }
            None => (clause, None),
        };

        let head = head.trim().trim_end_matches(',').trim();
        if !head.is_empty() && !head.starts_with('*') {
            if type_only {
                push_unique(&mut shape.types, head);
            } else if shape.default.is_none() {
                shape.default = Some(head.to_string());
            }
        }

        for item in braces.unwrap_or("").split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let (is_type, item) = match item.strip_prefix("type ") {
                Some(rest) => (true, rest.trim()),
                None => (type_only, item),
            };
            let name = item.split(" as ").next().unwrap_or(item).trim();
            if name == "default" || name.is_empty() {
                continue;
            }
            if is_type {
                push_unique(&mut shape.types, name);
            } else {
                push_unique(&mut shape.named, name);
            }
        }
    }
    shape
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| n == name) {
        list.push(name.to_string());
    }
}

fn is_pascal_case(name: &str) -> bool {
    name.chars().next().map(char::is_uppercase).unwrap_or(false)
}

/// Source text for a stub exporting `shape`.
pub(crate) fn render_stub(shape: &ExportShape, typescript: bool) -> String {
    let args = if typescript {
        "..._args: unknown[]"
    } else {
        "..._args"
    };
    let ret = if typescript { ": never" } else { "" };

    let mut out = String::from(
        "// Stub created by quality-check so the importing test can run.\n\
         // Replace with the real implementation.\n\n",
    );

    for name in &shape.named {
        if is_pascal_case(name) {
            out.push_str(&format!("export class {name} {{}}\n\n"));
        } else {
            out.push_str(&format!(
                "export function {name}({args}){ret} {{\n  throw new Error('{name} is not implemented');\n}}\n\n"
            ));
        }
    }

    if typescript {
        for name in &shape.types {
            out.push_str(&format!("export type {name} = unknown;\n\n"));
        }
    }

    if let Some(name) = &shape.default {
        if is_pascal_case(name) {
            out.push_str(&format!("export default class {name} {{}}\n"));
        } else {
            out.push_str(&format!(
                "export default function {name}({args}){ret} {{\n  throw new Error('{name} is not implemented');\n}}\n"
            ));
        }
    }

    if shape.is_empty() || (!typescript && shape.named.is_empty() && shape.default.is_none()) {
        out.push_str("export {};\n");
    }
    out
}

// ============================================================================
// Underscore heuristic
// ============================================================================

/// Whether an unused `name` on `line` uses the underscore as an accepted idiom.
pub(crate) fn is_legitimate_underscore(line: &str, name: &str) -> bool {
    let n = regex::escape(name);
    let declared = format!(r"\b(?:const|let|var|function|class)\s+{n}\b");
    if Regex::new(&declared).map(|re| re.is_match(line)).unwrap_or(false)
        || is_later_declarator(line, name)
    {
        return false;
    }

    let legitimate = [
        // catch (_err)
        format!(r"catch\s*\(\s*{n}\b"),
        // [_a, b] / { a: _a } / [..._rest]
        format!(r"[\[,]\s*(?:\.\.\.)?{n}\s*[,\]=]"),
        format!(r":\s*{n}\s*[,}}=]"),
        // (a, _b) => / function f(_a: T)
        format!(r"[(,]\s*(?:\.\.\.)?{n}\s*[?:,)=]"),
        // a parameter on its own line
        format!(r"^\s*(?:\.\.\.)?{n}\s*(?:[?:][^=]*)?,?\s*$"),
    ];
    legitimate
        .iter()
        .any(|p| Regex::new(p).map(|re| re.is_match(line)).unwrap_or(false))
}

/// Whether `name` follows a top-level comma in a `const`/`let`/`var` list,
/// as in `let a = 1, _b = 2;`.
fn is_later_declarator(line: &str, name: &str) -> bool {
    let Some(keyword) = declaration_re().find(line) else {
        return false;
    };
    let rest = &line[keyword.end()..];
    let mut depth = 0i32;
    for (i, c) in rest.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                let next = rest[i + 1..].trim_start();
                if let Some(tail) = next.strip_prefix(name) {
                    let ends = tail
                        .chars()
                        .next()
                        .map_or(true, |c| !(c.is_alphanumeric() || c == '_' || c == '$'));
                    if ends {
                        return true;
                    }
                }
            }
            _ => {}
        }
    }
    false
}

fn underscore_warnings(results: &[EslintFileResult]) -> Vec<Issue> {
    let mut warnings = Vec::new();
    for result in results {
        let candidates: Vec<&EslintMessage> = result
            .messages
            .iter()
            .filter(|m| {
                m.rule_id
                    .as_deref()
                    .map(|r| UNUSED_RULES.contains(&r))
                    .unwrap_or(false)
            })
            .collect();
        if candidates.is_empty() {
            continue;
        }

        let Ok(source) = std::fs::read_to_string(&result.file_path) else {
            continue;
        };
        let lines: Vec<&str> = source.lines().collect();

        for msg in candidates {
            let Some(caps) = underscore_name_re().captures(&msg.message) else {
                continue;
            };
            let name = &caps[1];
            let line_no = msg.line.unwrap_or(1);
            let Some(line) = lines.get(line_no.saturating_sub(1) as usize) else {
                continue;
            };
            if is_legitimate_underscore(line, name) {
                continue;
            }
            warnings.push(
                Issue::warning(
                    Tool::Lint,
                    format!(
                        "'{name}' is unused; delete it instead of hiding it behind an underscore prefix"
                    ),
                )
                .with_location(&result.file_path, line_no, msg.column.unwrap_or(1))
                .with_rule(DEAD_CODE_RULE),
            );
        }
    }
    warnings
}

// ============================================================================
// Engine
// ============================================================================

/// Lint engine.
#[derive(Debug, Clone)]
pub struct LintEngine {
    /// `None` disables eslint's on-disk cache.
    cache_location: Option<PathBuf>,
    synthesize_stubs: bool,
    test_files: GlobSet,
}

impl LintEngine {
    /// Build from lint settings; `cache_location` is the resolved cache directory.
    pub fn new(config: &EslintConfig, cache_location: impl AsRef<Path>) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.test_patterns {
            let glob = Glob::new(pattern).map_err(|e| {
                QualityError::config(format!("invalid test pattern '{pattern}': {e}"))
            })?;
            builder.add(glob);
        }
        let test_files = builder
            .build()
            .map_err(|e| QualityError::config(format!("invalid test patterns: {e}")))?;

        Ok(Self {
            cache_location: config.cache.then(|| cache_location.as_ref().to_path_buf()),
            synthesize_stubs: config.synthesize_stubs,
            test_files,
        })
    }

    /// Whether `path` follows the test-file naming convention.
    #[must_use]
    pub fn is_test_file(&self, path: &Path) -> bool {
        self.test_files.is_match(path)
    }

    fn run(
        &self,
        binary: &Path,
        ctx: &EngineContext,
        files: &[PathBuf],
        dry_fix: bool,
    ) -> Result<LintRun> {
        let mut args: Vec<String> = vec![
            "--format".into(),
            "json".into(),
            "--no-error-on-unmatched-pattern".into(),
        ];
        if let Some(dir) = &self.cache_location {
            std::fs::create_dir_all(dir)?;
            args.push("--cache".into());
            args.push("--cache-location".into());
            // A trailing separator makes eslint treat the location as a directory.
            args.push(format!("{}/", dir.display()));
        }
        if dry_fix {
            args.push("--fix-dry-run".into());
        }
        args.extend(files.iter().map(|f| f.to_string_lossy().into_owned()));

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = run_tool(binary, &arg_refs, &ctx.project_root)?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        if output.status.code() == Some(2) {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if MISSING_CONFIG_MARKERS.iter().any(|m| stderr.contains(m)) {
                return Err(QualityError::MissingEngineConfig {
                    engine: Tool::Lint.display_name().to_string(),
                    file: files.first().cloned().unwrap_or_default(),
                });
            }
            let detail = stderr
                .lines()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("eslint exited with a configuration error");
            return Ok(LintRun::ConfigError(detail.trim().to_string()));
        }

        let results: Vec<EslintFileResult> = serde_json::from_str(stdout.trim())
            .map_err(|e| QualityError::tool("eslint", format!("unreadable JSON output: {e}")))?;
        Ok(LintRun::Results(results))
    }

    /// Create stubs for unresolved relative imports in test files.
    pub(crate) fn synthesize(&self, ctx: &EngineContext, results: &[EslintFileResult]) -> Vec<PathBuf> {
        let mut created = Vec::new();

        for result in results.iter().filter(|r| self.is_test_file(&r.file_path)) {
            let specifiers: Vec<String> =
                result.messages.iter().filter_map(unresolved_specifier).collect();
            if specifiers.is_empty() {
                continue;
            }
            let source = std::fs::read_to_string(&result.file_path).unwrap_or_default();

            for specifier in specifiers {
                let Some(target) = stub_target(&result.file_path, &specifier, &ctx.project_root)
                else {
                    continue;
                };
                if created.contains(&target) {
                    continue;
                }

                let typescript = matches!(
                    target.extension().and_then(|e| e.to_str()),
                    Some("ts" | "mts" | "cts" | "tsx")
                );
                let stub = render_stub(&infer_exports(&source, &specifier), typescript);

                let written = target
                    .parent()
                    .map(std::fs::create_dir_all)
                    .transpose()
                    .and_then(|_| std::fs::write(&target, stub));
                match written {
                    Ok(()) => {
                        info!("Created stub {}", ctx.relative(&target).display());
                        created.push(target);
                    }
                    Err(e) => warn!("Failed to create stub {}: {}", target.display(), e),
                }
            }
        }
        created
    }

    fn lint(
        &self,
        binary: &Path,
        ctx: &EngineContext,
        targets: &[PathBuf],
    ) -> Result<std::result::Result<Vec<EslintFileResult>, CheckerResult>> {
        match self.run(binary, ctx, targets, false)? {
            LintRun::Results(results) => Ok(Ok(results)),
            LintRun::ConfigError(message) => Ok(Err(CheckerResult::from_issues(vec![
                Issue::error(Tool::Lint, message).with_rule(CONFIG_ERROR_RULE),
            ]))),
        }
    }

    fn check_inner(&self, ctx: &EngineContext, targets: &[PathBuf]) -> Result<CheckerResult> {
        let binary = resolve_binary(&ctx.project_root, "eslint")?;
        let mut autofixes = Vec::new();

        let mut results = match self.lint(&binary, ctx, targets)? {
            Ok(results) => results,
            Err(config_failure) => return Ok(config_failure),
        };

        if self.synthesize_stubs {
            let created = self.synthesize(ctx, &results);
            if !created.is_empty() {
                autofixes.extend(
                    created
                        .iter()
                        .map(|p| format!("created stub {}", ctx.relative(p).display())),
                );
                results = match self.lint(&binary, ctx, targets)? {
                    Ok(results) => results,
                    Err(config_failure) => return Ok(config_failure),
                };
            }
        }

        let mut pre_fix = Vec::new();
        if ctx.fix && !to_issues(&results).is_empty() {
            let before = to_issues(&results);
            let mut wrote = false;

            if let LintRun::Results(fixed) = self.run(&binary, ctx, targets, true)? {
                for file in fixed {
                    if let Some(output) = file.output {
                        std::fs::write(&file.file_path, output)?;
                        autofixes.push(format!(
                            "eslint fixed {}",
                            ctx.relative(&file.file_path).display()
                        ));
                        wrote = true;
                    }
                }
            }

            if wrote {
                results = match self.lint(&binary, ctx, targets)? {
                    Ok(results) => results,
                    Err(config_failure) => return Ok(config_failure),
                };
                if !to_issues(&results).is_empty() {
                    pre_fix = before;
                }
            }
        }

        let mut issues = to_issues(&results);
        issues.extend(underscore_warnings(&results));
        debug!("eslint reported {} issue(s)", issues.len());

        let mut checker = CheckerResult::from_issues(issues).with_pre_fix(pre_fix);
        checker.autofixes = autofixes;
        Ok(checker)
    }
}

impl Engine for LintEngine {
    fn tool(&self) -> Tool {
        Tool::Lint
    }

    fn check(&self, ctx: &EngineContext, files: &[PathBuf]) -> Result<CheckerResult> {
        let targets: Vec<PathBuf> = files.iter().filter(|f| is_source_file(f)).cloned().collect();
        if targets.is_empty() {
            return Ok(CheckerResult::skipped("no lintable files"));
        }

        match self.check_inner(ctx, &targets) {
            Err(e) if e.is_soft() => Ok(soft_skip(Tool::Lint, &e)),
            other => other,
        }
    }
}
