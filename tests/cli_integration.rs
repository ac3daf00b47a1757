//! Integration tests for the quality-check CLI

use assert_cmd::cargo;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Engines off so runs never depend on Node tooling being installed.
const DISABLED_ENGINES: &str = r#"{
    "typescript": {"enabled": false},
    "eslint": {"enabled": false},
    "prettier": {"enabled": false}
}"#;

/// Get a Command for the quality-check binary
fn quality_check() -> Command {
    Command::new(cargo::cargo_bin!("quality-check"))
}

fn project() -> TempDir {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("src")).unwrap();
    std::fs::write(temp.path().join("src/a.ts"), "export const a = 1;\n").unwrap();
    std::fs::write(temp.path().join(".quality-check.json"), DISABLED_ENGINES).unwrap();
    temp
}

fn hook(project: &TempDir, payload: &str) -> assert_cmd::assert::Assert {
    quality_check()
        .arg("--project")
        .arg(project.path())
        .arg("hook")
        .write_stdin(payload)
        .assert()
}

#[test]
fn test_help() {
    quality_check()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Type, lint and format checks"));
}

#[test]
fn test_version() {
    quality_check()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

// ============================================================================
// Hook
// ============================================================================

#[test]
fn test_hook_accepts_path() {
    let temp = project();
    hook(&temp, r#"{"tool":"Write","path":"src/a.ts","content":"export const a = 1;"}"#)
        .code(0)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::is_empty());
}

#[test]
fn test_hook_accepts_legacy_file_path() {
    let temp = project();
    hook(&temp, r#"{"tool":"Write","filePath":"src/a.ts"}"#)
        .code(0)
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_hook_without_path_is_skipped() {
    let temp = project();
    hook(&temp, r#"{"tool":"Write"}"#).code(0);
}

#[test]
fn test_hook_rejects_traversal() {
    let temp = project();
    hook(&temp, r#"{"tool":"Write","path":"../../etc/passwd"}"#)
        .code(0)
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_hook_invalid_json_is_skipped() {
    let temp = project();
    hook(&temp, "this is not json").code(0);
}

#[test]
fn test_hook_broken_config_is_internal_error() {
    let temp = project();
    std::fs::write(temp.path().join(".quality-check.json"), "{ broken").unwrap();
    hook(&temp, r#"{"tool":"Write","path":"src/a.ts"}"#)
        .code(1)
        .stderr(predicate::str::contains("internal error"));
}

// ============================================================================
// Check
// ============================================================================

#[test]
fn test_check_clean_project_is_silent() {
    let temp = project();
    quality_check()
        .arg("--project")
        .arg(temp.path())
        .arg("check")
        .assert()
        .code(0)
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_check_json_is_silent_on_success() {
    let temp = project();
    quality_check()
        .arg("--project")
        .arg(temp.path())
        .arg("check")
        .arg("--format")
        .arg("json")
        .arg(temp.path().join("src/a.ts"))
        .assert()
        .code(0)
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_check_missing_project_fails() {
    quality_check()
        .arg("--project")
        .arg("/definitely/not/a/real/project/dir")
        .arg("check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_check_invalid_format_is_rejected() {
    let temp = project();
    quality_check()
        .arg("--project")
        .arg(temp.path())
        .arg("check")
        .arg("--format")
        .arg("xml")
        .assert()
        .failure();
}

// ============================================================================
// Classify & cache
// ============================================================================

#[test]
fn test_classify_builtin_rule() {
    let temp = project();
    quality_check()
        .arg("--project")
        .arg(temp.path())
        .arg("classify")
        .arg("--rule")
        .arg("no-unused-vars")
        .assert()
        .success()
        .stdout(predicate::str::contains("agent-fixable"))
        .stdout(predicate::str::contains("Instruction:"));
}

#[test]
fn test_classify_unknown_rule_is_human_required() {
    let temp = project();
    quality_check()
        .arg("--project")
        .arg(temp.path())
        .arg("classify")
        .arg("--rule")
        .arg("made-up/rule")
        .assert()
        .success()
        .stdout(predicate::str::contains("human-required"))
        .stdout(predicate::str::contains("stop-and-educate"));
}

#[test]
fn test_classify_with_rules_file_from_env() {
    let temp = project();
    let rules = temp.path().join("rules.json");
    std::fs::write(&rules, r#"{"extend": true, "autoFixable": ["team/style"]}"#).unwrap();

    quality_check()
        .env("QUALITY_CHECK_RULES", &rules)
        .arg("--project")
        .arg(temp.path())
        .arg("classify")
        .arg("--rule")
        .arg("team/style")
        .assert()
        .success()
        .stdout(predicate::str::contains("auto-fixable"));
}

#[test]
fn test_cache_clear() {
    let temp = project();
    let cache = TempDir::new().unwrap();

    quality_check()
        .env("QUALITY_CHECK_TSC_CACHE_DIR", cache.path())
        .arg("--project")
        .arg(temp.path())
        .arg("cache")
        .arg("clear")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared"));
}
