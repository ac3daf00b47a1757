//! Engine adapters wrapping the external static-analysis tools.
//!
//! Each engine wraps exactly one tool behind the [`Engine`] trait and
//! normalizes its native diagnostics into [`Issue`](super::Issue):
//!
//! - [`TypeEngine`] - `tsc`, incremental, scoped to the target file
//! - [`LintEngine`] - `eslint`, with test-stub synthesis and an unused-variable heuristic
//! - [`FormatEngine`] - `prettier`, check or write
//!
//! The aggregator holds a list of `Arc<dyn Engine>` and never looks at the
//! concrete type. Environment problems (missing binary, missing config) turn
//! into a skipped [`CheckerResult`] inside the engine; diagnostics are always
//! returned as data.

pub mod eslint;
pub mod prettier;
pub mod typescript;

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::debug;

use super::issue::{CheckerResult, Tool};
use crate::error::{QualityError, Result};

pub use eslint::LintEngine;
pub use prettier::FormatEngine;
pub use typescript::TypeEngine;

/// Per-invocation inputs shared by all engines.
#[derive(Debug, Clone)]
pub struct EngineContext {
    /// Project root; tools run with this as their working directory.
    pub project_root: PathBuf,
    /// Write fixes back instead of only reporting.
    pub fix: bool,
}

impl EngineContext {
    #[must_use]
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
            fix: false,
        }
    }

    #[must_use]
    pub fn with_fix(mut self, fix: bool) -> Self {
        self.fix = fix;
        self
    }

    /// Path relative to the project root for display and cache keys.
    #[must_use]
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.project_root).unwrap_or(path)
    }
}

/// One static-analysis tool behind a uniform check contract.
///
/// # Thread Safety
///
/// Engines share no in-memory state and may run concurrently, so every
/// implementation must be `Send + Sync`.
pub trait Engine: Send + Sync {
    /// Which canonical tool this engine reports as.
    fn tool(&self) -> Tool;

    /// Display name of this engine.
    fn name(&self) -> &str {
        self.tool().display_name()
    }

    /// Check `files` (absolute paths) and return the normalized outcome.
    ///
    /// # Errors
    ///
    /// Only for unexpected failures; the aggregator turns them into a skip.
    fn check(&self, ctx: &EngineContext, files: &[PathBuf]) -> Result<CheckerResult>;
}

/// Locate a tool binary: the nearest `node_modules/.bin`, then `PATH`.
///
/// Never falls back to a network installer.
pub fn resolve_binary(project_root: &Path, tool: &str) -> Result<PathBuf> {
    for dir in project_root.ancestors() {
        let candidate = dir.join("node_modules").join(".bin").join(tool);
        if candidate.is_file() {
            debug!("Using {} from {}", tool, candidate.display());
            return Ok(candidate);
        }
    }

    which::which(tool).map_err(|_| QualityError::MissingTool {
        tool: tool.to_string(),
    })
}

/// Run a resolved tool in `cwd`, capturing its output.
pub fn run_tool(binary: &Path, args: &[&str], cwd: &Path) -> Result<Output> {
    debug!("Running {} {}", binary.display(), args.join(" "));
    Command::new(binary)
        .args(args)
        .current_dir(cwd)
        .output()
        .map_err(|e| QualityError::tool(binary.display().to_string(), e.to_string()))
}

/// Walk from `file`'s directory up to `stop_at` looking for any of `names`.
pub fn find_nearest_config(file: &Path, stop_at: &Path, names: &[&str]) -> Option<PathBuf> {
    let start = file.parent()?;
    for dir in start.ancestors() {
        for name in names {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        if dir == stop_at {
            break;
        }
    }
    None
}

/// Build the standard skip result for a soft failure, logging it once.
pub(crate) fn soft_skip(tool: Tool, err: &QualityError) -> CheckerResult {
    tracing::warn!("Skipping {}: {}", tool.display_name(), err);
    CheckerResult::skipped(err.to_string())
}

/// Stand-in tool binaries for engine tests.
#[cfg(all(test, unix))]
pub(crate) mod fake_tools {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Install `script` as `<root>/node_modules/.bin/<name>`, which
    /// [`resolve_binary`](super::resolve_binary) prefers over `PATH`.
    pub fn install(root: &Path, name: &str, script: &str) -> PathBuf {
        let bin = root.join("node_modules/.bin");
        std::fs::create_dir_all(&bin).unwrap();
        let path = bin.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{script}")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Lines appended to `log` by a fake tool, one per invocation.
    pub fn invocations(log: &Path) -> Vec<String> {
        std::fs::read_to_string(log)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}
