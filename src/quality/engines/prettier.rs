//! Format engine backed by `prettier`.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, Level};

use super::{resolve_binary, run_tool, soft_skip, Engine, EngineContext};
use crate::error::{QualityError, Result};
use crate::quality::issue::{CheckerResult, Issue, Tool};

/// Rule id carried by every formatting issue.
pub const FORMAT_RULE: &str = "prettier/prettier";

/// Rule id for files prettier could not parse.
pub const SYNTAX_RULE: &str = "prettier/syntax-error";

/// `prettier --file-info` output.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileInfo {
    #[serde(default)]
    pub ignored: bool,
    #[serde(default)]
    pub inferred_parser: Option<String>,
}

impl FileInfo {
    pub fn is_applicable(&self) -> bool {
        !self.ignored && self.inferred_parser.is_some()
    }
}

/// Format engine.
#[derive(Debug, Clone, Default)]
pub struct FormatEngine;

impl FormatEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn file_info(&self, binary: &Path, ctx: &EngineContext, file: &Path) -> Result<FileInfo> {
        let path = file.to_string_lossy();
        let output = run_tool(binary, &["--file-info", path.as_ref()], &ctx.project_root)?;
        if !output.status.success() {
            return Err(QualityError::tool(
                "prettier",
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(serde_json::from_slice(&output.stdout)?)
    }

    fn log_config_path(&self, binary: &Path, ctx: &EngineContext, file: &Path) {
        let path = file.to_string_lossy();
        match run_tool(binary, &["--find-config-path", path.as_ref()], &ctx.project_root) {
            Ok(out) if out.status.success() => debug!(
                "prettier config for {}: {}",
                ctx.relative(file).display(),
                String::from_utf8_lossy(&out.stdout).trim()
            ),
            _ => debug!(
                "No prettier config for {}; using defaults",
                ctx.relative(file).display()
            ),
        }
    }

    fn check_file(
        &self,
        binary: &Path,
        ctx: &EngineContext,
        file: &Path,
        result: &mut CheckerResult,
        issues: &mut Vec<Issue>,
    ) -> Result<bool> {
        let info = self.file_info(binary, ctx, file)?;
        if !info.is_applicable() {
            debug!(
                "prettier skipping {} (ignored: {}, parser: {:?})",
                ctx.relative(file).display(),
                info.ignored,
                info.inferred_parser
            );
            return Ok(false);
        }
        if tracing::enabled!(Level::DEBUG) {
            self.log_config_path(binary, ctx, file);
        }

        let path = file.to_string_lossy();
        let rel = ctx.relative(file).display().to_string();

        if ctx.fix {
            let before = std::fs::read(file)?;
            let output = run_tool(binary, &["--write", path.as_ref()], &ctx.project_root)?;
            if !output.status.success() {
                issues.push(syntax_issue(file, &output.stderr));
                return Ok(true);
            }
            if std::fs::read(file)? != before {
                result.autofixes.push(format!("formatted {rel}"));
            }
            return Ok(true);
        }

        let output = run_tool(binary, &["--check", path.as_ref()], &ctx.project_root)?;
        match output.status.code() {
            Some(0) => {}
            Some(1) => issues.push(
                Issue::error(Tool::Format, "File is not formatted")
                    .with_file(file)
                    .with_rule(FORMAT_RULE),
            ),
            _ => issues.push(syntax_issue(file, &output.stderr)),
        }
        Ok(true)
    }
}

fn syntax_issue(file: &Path, stderr: &[u8]) -> Issue {
    let stderr = String::from_utf8_lossy(stderr);
    let message = stderr
        .lines()
        .find(|l| !l.trim().is_empty())
        .map(|l| l.trim().trim_start_matches("[error]").trim().to_string())
        .unwrap_or_else(|| "prettier could not format this file".to_string());
    Issue::error(Tool::Format, message)
        .with_file(file)
        .with_rule(SYNTAX_RULE)
}

impl Engine for FormatEngine {
    fn tool(&self) -> Tool {
        Tool::Format
    }

    fn check(&self, ctx: &EngineContext, files: &[PathBuf]) -> Result<CheckerResult> {
        if files.is_empty() {
            return Ok(CheckerResult::skipped("no files to format"));
        }

        let binary = match resolve_binary(&ctx.project_root, "prettier") {
            Ok(b) => b,
            Err(e) => return Ok(soft_skip(Tool::Format, &e)),
        };

        let mut marker = CheckerResult::default();
        let mut issues = Vec::new();
        let mut applicable = 0usize;

        for file in files {
            match self.check_file(&binary, ctx, file, &mut marker, &mut issues) {
                Ok(true) => applicable += 1,
                Ok(false) => {}
                Err(e) if e.is_soft() => return Ok(soft_skip(Tool::Format, &e)),
                Err(e) => return Err(e),
            }
        }

        if applicable == 0 {
            return Ok(CheckerResult::skipped("no files prettier can format"));
        }

        let mut result = CheckerResult::from_issues(issues);
        result.autofixes = marker.autofixes;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(unix)]
    use tempfile::TempDir;

    #[test]
    fn test_file_info_applicability() {
        let info: FileInfo =
            serde_json::from_str(r#"{"ignored": false, "inferredParser": "typescript"}"#).unwrap();
        assert!(info.is_applicable());

        let info: FileInfo =
            serde_json::from_str(r#"{"ignored": false, "inferredParser": null}"#).unwrap();
        assert!(!info.is_applicable());

        let info: FileInfo =
            serde_json::from_str(r#"{"ignored": true, "inferredParser": "babel"}"#).unwrap();
        assert!(!info.is_applicable());
    }

    #[test]
    fn test_syntax_issue_strips_prefix() {
        let issue = syntax_issue(
            Path::new("/proj/a.ts"),
            b"[error] a.ts: SyntaxError: ';' expected. (1:10)\n",
        );
        assert_eq!(issue.rule_id.as_deref(), Some(SYNTAX_RULE));
        assert!(issue.message.starts_with("a.ts: SyntaxError"));
    }

    #[test]
    fn test_no_files_is_skip() {
        let result = FormatEngine::new()
            .check(&EngineContext::new("/proj"), &[])
            .unwrap();
        assert!(result.success);
        assert!(result.is_skipped());
    }

    /// Fake prettier that treats tab indentation as unformatted.
    #[cfg(unix)]
    const FAKE_PRETTIER: &str = r##"
echo "$1" >> "@LOG@"
tab=$(printf '\t')
case "$1" in
  --file-info) echo '{"ignored":false,"inferredParser":"typescript"}' ;;
  --find-config-path) echo ".prettierrc" ;;
  --check) if grep -q "$tab" "$2"; then exit 1; fi ;;
  --write)
    awk '{gsub(/\t/, "  "); print}' "$2" > "$2.tmp" && mv "$2.tmp" "$2" ;;
esac
"##;

    #[cfg(unix)]
    fn fake_prettier_project() -> (TempDir, PathBuf, PathBuf) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        std::fs::create_dir_all(root.join("src")).unwrap();
        let log = root.join("prettier.log");
        crate::quality::engines::fake_tools::install(
            &root,
            "prettier",
            &FAKE_PRETTIER.replace("@LOG@", &log.to_string_lossy()),
        );
        (temp, root, log)
    }

    #[cfg(unix)]
    #[test]
    fn test_write_records_one_autofix_marker() {
        let (_temp, root, log) = fake_prettier_project();
        let file = root.join("src/a.ts");
        std::fs::write(&file, "function f() {\n\treturn 1;\n}\n").unwrap();

        let ctx = EngineContext::new(&root).with_fix(true);
        let result = FormatEngine::new().check(&ctx, &[file.clone()]).unwrap();

        assert!(result.success);
        assert_eq!(result.autofixes, vec!["formatted src/a.ts".to_string()]);
        assert_eq!(
            std::fs::read_to_string(&file).unwrap(),
            "function f() {\n  return 1;\n}\n"
        );

        let again = FormatEngine::new().check(&ctx, &[file]).unwrap();
        assert!(again.autofixes.is_empty());

        let runs = crate::quality::engines::fake_tools::invocations(&log);
        assert!(!runs.iter().any(|r| r == "--find-config-path"));
    }

    #[cfg(unix)]
    #[test]
    fn test_check_reports_unformatted_file() {
        let (_temp, root, _log) = fake_prettier_project();
        let file = root.join("src/a.ts");
        std::fs::write(&file, "\tlet x = 1;\n").unwrap();

        let result = FormatEngine::new()
            .check(&EngineContext::new(&root), &[file.clone()])
            .unwrap();

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].rule_id.as_deref(), Some(FORMAT_RULE));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "\tlet x = 1;\n");
    }
}

