//! Editor/agent hook: one file event in on stdin, an exit code out.
//!
//! The payload is untrusted. It is parsed into a typed [`HookPayload`] before
//! any field is used, and the target path must be relative with no `..`
//! components. Anything wrong with the payload degrades to a no-op so a
//! broken hook never blocks the editing session.
//!
//! Exit codes follow [`crate::error`]: `0` success or nothing to do, `2`
//! blocking issues (agent report on stderr), `1` internal failure.

use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::is_source_file;
use crate::error::{QualityError, Result, EXIT_INTERNAL_ERROR, EXIT_QUALITY_ISSUES, EXIT_SUCCESS};
use crate::pipeline::QualityChecker;
use crate::quality::QualityCheckResult;
use crate::report::{AgentMode, OutputFormat, ReportOptions};

/// Hard limit for reading the payload.
pub const STDIN_TIMEOUT: Duration = Duration::from_secs(5);

/// A file event from the host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookPayload {
    pub tool: String,
    #[serde(default)]
    pub path: Option<String>,
    /// Legacy name for `path`.
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub project_dir: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

impl HookPayload {
    /// Parse and validate raw stdin.
    pub fn parse(input: &str) -> Result<Self> {
        if input.trim().is_empty() {
            return Err(QualityError::hook_payload("empty input"));
        }
        let payload: Self = serde_json::from_str(input)
            .map_err(|e| QualityError::hook_payload(format!("not a valid payload: {e}")))?;
        if payload.tool.trim().is_empty() {
            return Err(QualityError::hook_payload("empty tool"));
        }
        Ok(payload)
    }

    /// The target path, `path` winning over `filePath`.
    pub fn target(&self) -> Result<&str> {
        self.path
            .as_deref()
            .or(self.file_path.as_deref())
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| QualityError::hook_payload("missing path"))
    }
}

/// Reject absolute paths and any `..` component.
pub fn validate_target(path: &str) -> Result<PathBuf> {
    let candidate = Path::new(path);
    if candidate.is_absolute() || path.starts_with('/') || path.starts_with('\\') {
        return Err(QualityError::hook_payload(format!(
            "absolute path rejected: {path}"
        )));
    }
    if path.split(['/', '\\']).any(|part| part == "..")
        || candidate.components().any(|c| matches!(c, Component::ParentDir))
    {
        return Err(QualityError::hook_payload(format!(
            "path traversal rejected: {path}"
        )));
    }
    if candidate.components().any(|c| matches!(c, Component::Prefix(_))) {
        return Err(QualityError::hook_payload(format!(
            "drive-qualified path rejected: {path}"
        )));
    }
    Ok(candidate.to_path_buf())
}

/// Read all of `reader`, giving up after `timeout`.
pub async fn read_input<R: AsyncRead + Unpin>(mut reader: R, timeout: Duration) -> Result<String> {
    let mut buf = String::new();
    match tokio::time::timeout(timeout, reader.read_to_string(&mut buf)).await {
        Ok(Ok(_)) => Ok(buf),
        Ok(Err(e)) => Err(e.into()),
        Err(_elapsed) => Err(QualityError::StdinTimeout {
            seconds: timeout.as_secs(),
        }),
    }
}

/// What the hook decided.
#[derive(Debug, Clone)]
pub struct HookOutcome {
    pub exit_code: i32,
    /// Text for stderr; empty on success.
    pub output: String,
    /// The result, when the pipeline ran or failed internally.
    pub result: Option<QualityCheckResult>,
}

impl HookOutcome {
    fn no_op(reason: &str) -> Self {
        debug!("Hook no-op: {}", reason);
        Self {
            exit_code: EXIT_SUCCESS,
            output: String::new(),
            result: None,
        }
    }

    fn internal(message: String, correlation_id: &str, started: Instant) -> Self {
        error!("[{}] {}", correlation_id, message);
        let result = QualityCheckResult::internal_failure(&message, correlation_id)
            .with_duration(started.elapsed().as_millis() as u64);
        Self {
            exit_code: EXIT_INTERNAL_ERROR,
            output: format!("quality-check internal error: {message}\n"),
            result: Some(result),
        }
    }
}

/// Run the hook protocol against `reader`.
///
/// `fallback_project` is used when the payload carries no `projectDir`.
pub async fn run_hook<R: AsyncRead + Unpin>(
    reader: R,
    fallback_project: &Path,
    stdin_timeout: Duration,
) -> HookOutcome {
    let started = Instant::now();

    let input = match read_input(reader, stdin_timeout).await {
        Ok(input) => input,
        Err(e) => return HookOutcome::internal(e.to_string(), &Uuid::new_v4().to_string(), started),
    };

    let payload = match HookPayload::parse(&input) {
        Ok(p) => p,
        Err(e) => return HookOutcome::no_op(&e.to_string()),
    };
    let target = match payload.target().and_then(validate_target) {
        Ok(t) => t,
        Err(e) => return HookOutcome::no_op(&e.to_string()),
    };
    if !is_source_file(&target) {
        return HookOutcome::no_op("unsupported file type");
    }

    let correlation_id = payload
        .correlation_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let project = payload
        .project_dir
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| fallback_project.to_path_buf());

    info!(
        "[{}] {} event for {}",
        correlation_id,
        payload.tool,
        target.display()
    );

    // The pipeline runs in its own task so a panic becomes a failure result.
    let id = correlation_id.clone();
    let task = tokio::spawn(async move {
        let checker = QualityChecker::new(&project)?;
        let file = checker.project_root().join(&target);
        let outcome = checker.check_file(&file, &id).await;
        let options = ReportOptions {
            format: OutputFormat::Agent,
            agent_mode: AgentMode::Default,
            root: Some(checker.project_root().to_path_buf()),
            ..ReportOptions::from_config(&checker.config().report)
        };
        let rendered = outcome.render(&options);
        Ok::<_, QualityError>((outcome, rendered))
    });

    let (outcome, rendered) = match task.await {
        Ok(Ok(done)) => done,
        Ok(Err(e)) => return HookOutcome::internal(e.to_string(), &correlation_id, started),
        Err(e) => {
            return HookOutcome::internal(
                format!("pipeline panicked: {e}"),
                &correlation_id,
                started,
            )
        }
    };

    let exit_code = outcome.exit_code();
    let result = outcome
        .result
        .with_duration(started.elapsed().as_millis() as u64);
    debug!("[{}] hook finished in {}ms", correlation_id, result.duration());

    if exit_code == EXIT_SUCCESS {
        return HookOutcome {
            exit_code: EXIT_SUCCESS,
            output: String::new(),
            result: Some(result),
        };
    }

    HookOutcome {
        exit_code: EXIT_QUALITY_ISSUES,
        output: rendered,
        result: Some(result),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DISABLED_ENGINES: &str = r#"{
        "typescript": {"enabled": false},
        "eslint": {"enabled": false},
        "prettier": {"enabled": false}
    }"#;

    #[test]
    fn test_payload_with_path() {
        let p = HookPayload::parse(r#"{"tool":"Write","path":"a.ts","content":"x"}"#).unwrap();
        assert_eq!(p.target().unwrap(), "a.ts");
    }

    #[test]
    fn test_payload_with_legacy_file_path() {
        let p = HookPayload::parse(r#"{"tool":"Write","filePath":"a.ts"}"#).unwrap();
        assert_eq!(p.target().unwrap(), "a.ts");
    }

    #[test]
    fn test_path_wins_over_file_path() {
        let p = HookPayload::parse(r#"{"tool":"Edit","path":"a.ts","filePath":"b.ts"}"#).unwrap();
        assert_eq!(p.target().unwrap(), "a.ts");
    }

    #[test]
    fn test_missing_path_is_rejected() {
        let p = HookPayload::parse(r#"{"tool":"Write"}"#).unwrap();
        let err = p.target().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_missing_tool_and_bad_json_are_rejected() {
        assert!(HookPayload::parse(r#"{"path":"a.ts"}"#).unwrap_err().is_validation());
        assert!(HookPayload::parse("not json").unwrap_err().is_validation());
        assert!(HookPayload::parse("   ").unwrap_err().is_validation());
        assert!(HookPayload::parse(r#"{"tool":42,"path":"a.ts"}"#).is_err());
    }

    #[test]
    fn test_validate_target() {
        assert!(validate_target("src/a.ts").is_ok());
        assert!(validate_target("../../etc/passwd").is_err());
        assert!(validate_target("src/../../x.ts").is_err());
        assert!(validate_target("/etc/passwd").is_err());
        assert!(validate_target("\\\\server\\share").is_err());
    }

    #[tokio::test]
    async fn test_read_input_times_out() {
        let (_writer, reader) = tokio::io::duplex(64);
        let err = read_input(reader, Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, QualityError::StdinTimeout { .. }));
    }

    async fn run(input: &str, project: &Path) -> HookOutcome {
        run_hook(input.as_bytes(), project, Duration::from_secs(1)).await
    }

    fn project() -> TempDir {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("src")).unwrap();
        std::fs::write(temp.path().join("src/a.ts"), "export const a = 1;\n").unwrap();
        std::fs::write(temp.path().join(".quality-check.json"), DISABLED_ENGINES).unwrap();
        temp
    }

    #[tokio::test]
    async fn test_hook_accepts_path_and_is_silent() {
        let temp = project();
        let outcome = run(r#"{"tool":"Write","path":"src/a.ts","content":"..."}"#, temp.path()).await;
        assert_eq!(outcome.exit_code, EXIT_SUCCESS);
        assert!(outcome.output.is_empty());
        assert!(outcome.result.unwrap().success());
    }

    #[tokio::test]
    async fn test_hook_accepts_legacy_file_path() {
        let temp = project();
        let outcome = run(r#"{"tool":"Write","filePath":"src/a.ts"}"#, temp.path()).await;
        assert_eq!(outcome.exit_code, EXIT_SUCCESS);
        assert!(outcome.result.is_some());
    }

    #[tokio::test]
    async fn test_hook_degrades_to_no_op() {
        let temp = project();
        for input in [
            r#"{"tool":"Write"}"#,
            r#"{"tool":"Write","path":"../../etc/passwd"}"#,
            r#"{"tool":"Write","path":"/etc/passwd"}"#,
            "{ not json",
            r#"{"tool":"Write","path":"README.md"}"#,
        ] {
            let outcome = run(input, temp.path()).await;
            assert_eq!(outcome.exit_code, EXIT_SUCCESS, "{}", input);
            assert!(outcome.result.is_none(), "{}", input);
        }
    }

    #[tokio::test]
    async fn test_hook_uses_project_dir_and_correlation_id() {
        let temp = project();
        let payload = serde_json::json!({
            "tool": "Edit",
            "path": "src/a.ts",
            "projectDir": temp.path(),
            "correlationId": "abc-123",
        })
        .to_string();
        let elsewhere = TempDir::new().unwrap();

        let outcome = run(&payload, elsewhere.path()).await;
        assert_eq!(outcome.result.unwrap().correlation_id(), "abc-123");
    }

    #[tokio::test]
    async fn test_broken_config_is_internal_failure() {
        let temp = project();
        std::fs::write(temp.path().join(".quality-check.json"), "{ broken").unwrap();
        let outcome = run(r#"{"tool":"Write","path":"src/a.ts"}"#, temp.path()).await;
        assert_eq!(outcome.exit_code, EXIT_INTERNAL_ERROR);
        let result = outcome.result.unwrap();
        assert!(!result.success());
        assert_eq!(
            result.issues()[0].rule_id.as_deref(),
            Some("quality-check/internal-error")
        );
        assert_eq!(result.issues()[0].tool, crate::quality::Tool::Internal);
    }
}
