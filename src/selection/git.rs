//! Git queries used by file selection.
//!
//! Every function shells out to `git` in a given directory and returns
//! absolute paths. Failures surface as [`QualityError::Git`]; callers decide
//! whether that degrades to "not a repository".

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::error::{QualityError, Result};

/// What we know about the repository enclosing the working directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitInfo {
    pub is_git_repository: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_root: Option<PathBuf>,
    pub has_gitignore: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gitignore_patterns: Option<Vec<String>>,
}

impl GitInfo {
    /// The degraded state used whenever detection fails.
    #[must_use]
    pub fn not_a_repository() -> Self {
        Self::default()
    }
}

fn run_git(dir: &Path, operation: &str, args: &[&str]) -> Result<Vec<u8>> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| QualityError::git(operation, e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(QualityError::git(operation, stderr.trim().to_string()));
    }

    Ok(output.stdout)
}

/// Locate the repository root enclosing `dir`.
pub fn find_root(dir: &Path) -> Result<PathBuf> {
    let stdout = run_git(dir, "rev-parse", &["rev-parse", "--show-toplevel"])?;
    let root = PathBuf::from(String::from_utf8_lossy(&stdout).trim());
    Ok(root.canonicalize().unwrap_or(root))
}

/// Read the non-empty, non-comment lines of a `.gitignore`.
pub fn read_gitignore_patterns(gitignore: &Path) -> std::io::Result<Vec<String>> {
    let content = std::fs::read_to_string(gitignore)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Files in the index that are added, copied, modified or renamed relative to HEAD.
///
/// Renames report their new path only.
pub fn staged_files(root: &Path) -> Result<Vec<PathBuf>> {
    let stdout = run_git(
        root,
        "diff --cached",
        &["diff", "--cached", "--name-only", "-z", "--diff-filter=ACMR", "-M"],
    )?;
    Ok(parse_file_list(root, &stdout))
}

/// Files added, copied, modified or renamed since `reference`, plus untracked files.
pub fn changed_since(root: &Path, reference: &str) -> Result<Vec<PathBuf>> {
    let diff = run_git(
        root,
        "diff",
        &["diff", "--name-only", "-z", "--diff-filter=ACMR", "-M", reference],
    )?;
    let untracked = run_git(
        root,
        "ls-files",
        &["ls-files", "-z", "--others", "--exclude-standard"],
    )?;

    let mut files = parse_file_list(root, &diff);
    for file in parse_file_list(root, &untracked) {
        if !files.contains(&file) {
            files.push(file);
        }
    }
    Ok(files)
}

/// Parse a NUL-separated (`-z`) list of repo-relative paths into absolute
/// paths. Names are taken verbatim, so no C-style quoting is involved.
fn parse_file_list(root: &Path, output: &[u8]) -> Vec<PathBuf> {
    output
        .split(|b| *b == 0)
        .filter(|name| !name.is_empty())
        .map(|name| root.join(os_string_from_bytes(name)))
        .collect()
}

#[cfg(unix)]
fn os_string_from_bytes(bytes: &[u8]) -> OsString {
    use std::os::unix::ffi::OsStrExt;
    std::ffi::OsStr::from_bytes(bytes).to_os_string()
}

#[cfg(not(unix))]
fn os_string_from_bytes(bytes: &[u8]) -> OsString {
    OsString::from(String::from_utf8_lossy(bytes).into_owned())
}

/// Make a path absolute and resolve `.` / `..` without touching the disk
/// unless the path exists, in which case symlinks are resolved too.
pub fn normalize_path(path: &Path, cwd: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };

    if let Ok(canonical) = absolute.canonicalize() {
        return canonical;
    }

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
