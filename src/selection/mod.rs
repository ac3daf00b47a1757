//! Git-aware file selection.
//!
//! [`FileSelector`] decides which files are in scope for a run: an explicit
//! list (directories are expanded), the staged set for pre-commit use, or the
//! files changed since a reference. Git awareness is a convenience. When git
//! is missing or the directory is not a repository the selector degrades to
//! "not a repository" and nothing is filtered by `.gitignore`.
//!
//! # Example
//!
//! ```rust,ignore
//! use quality_check::selection::{FileSelector, FilterOptions};
//!
//! let selector = FileSelector::new(".");
//! let files = selector.filter_files(&inputs, &FilterOptions::pre_commit());
//! ```

pub mod git;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

pub use git::{normalize_path, GitInfo};

use crate::config::is_source_file;

/// Directories never descended into when expanding a directory argument.
const SKIPPED_DIRS: &[&str] = &["node_modules", ".git", "dist", "build", "coverage", ".next"];

/// How [`FileSelector::filter_files`] narrows its input.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    /// Keep only files in the staged set.
    pub staged_only: bool,
    /// Keep only files changed since this reference.
    pub since: Option<String>,
    /// Drop files matched by `.gitignore`.
    pub respect_gitignore: bool,
}

impl FilterOptions {
    /// Options for a pre-commit hook: staged files, gitignore respected.
    #[must_use]
    pub fn pre_commit() -> Self {
        Self {
            staged_only: true,
            since: None,
            respect_gitignore: true,
        }
    }

    #[must_use]
    pub fn with_gitignore(mut self, respect: bool) -> Self {
        self.respect_gitignore = respect;
        self
    }

    #[must_use]
    pub fn with_since(mut self, reference: impl Into<String>) -> Self {
        self.since = Some(reference.into());
        self
    }
}

#[derive(Debug)]
struct GitState {
    info: GitInfo,
    matcher: Option<Gitignore>,
}

/// Selects the files a run operates on.
#[derive(Debug)]
pub struct FileSelector {
    cwd: PathBuf,
    git_enabled: bool,
    state: OnceLock<GitState>,
}

impl FileSelector {
    /// Create a git-aware selector rooted at `cwd`.
    #[must_use]
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        let cwd = cwd.as_ref();
        Self {
            cwd: cwd.canonicalize().unwrap_or_else(|_| cwd.to_path_buf()),
            git_enabled: true,
            state: OnceLock::new(),
        }
    }

    /// Turn git awareness off entirely.
    #[must_use]
    pub fn without_git(mut self) -> Self {
        self.git_enabled = false;
        self
    }

    /// Detect the repository and load `.gitignore`. Computed once; later
    /// calls return the memoized info.
    pub fn initialize(&self) -> &GitInfo {
        &self.state().info
    }

    /// Drop the memoized state and detect again.
    pub fn reinitialize(&mut self) -> &GitInfo {
        self.state = OnceLock::new();
        self.initialize()
    }

    fn state(&self) -> &GitState {
        self.state.get_or_init(|| {
            if !self.git_enabled {
                return GitState {
                    info: GitInfo::not_a_repository(),
                    matcher: None,
                };
            }
            detect(&self.cwd)
        })
    }

    /// Whether `.gitignore` excludes `path`.
    ///
    /// Always false when git awareness is off, outside a repository, or for
    /// paths outside the repository root.
    pub fn should_ignore_file(&self, path: &Path) -> bool {
        let state = self.state();
        let (Some(root), Some(matcher)) = (state.info.git_root.as_ref(), state.matcher.as_ref())
        else {
            return false;
        };

        let absolute = normalize_path(path, &self.cwd);
        let Ok(relative) = absolute.strip_prefix(root) else {
            return false;
        };
        if relative.as_os_str().is_empty() {
            return false;
        }

        matcher
            .matched_path_or_any_parents(relative, absolute.is_dir())
            .is_ignore()
    }

    /// Absolute paths of the staged (added or modified) files.
    ///
    /// Empty, with a warning, when not inside a repository.
    pub fn get_staged_files(&self) -> Vec<PathBuf> {
        let Some(root) = self.initialize().git_root.clone() else {
            warn!("Not a git repository; no staged files");
            return Vec::new();
        };

        match git::staged_files(&root) {
            Ok(files) => files,
            Err(e) => {
                warn!("Could not list staged files: {}", e);
                Vec::new()
            }
        }
    }

    /// Absolute paths changed since `reference`.
    pub fn get_changed_files(&self, reference: &str) -> Vec<PathBuf> {
        let Some(root) = self.initialize().git_root.clone() else {
            warn!("Not a git repository; cannot diff against {}", reference);
            return Vec::new();
        };

        match git::changed_since(&root, reference) {
            Ok(files) => files,
            Err(e) => {
                warn!("Could not list files changed since {}: {}", reference, e);
                Vec::new()
            }
        }
    }

    /// Narrow `files` according to `opts`.
    ///
    /// Staged filtering runs before gitignore filtering, so either rule can
    /// exclude a path on its own. Returned paths are absolute.
    pub fn filter_files(&self, files: &[PathBuf], opts: &FilterOptions) -> Vec<PathBuf> {
        let mut selected: Vec<PathBuf> = files
            .iter()
            .map(|f| normalize_path(f, &self.cwd))
            .collect();

        if opts.staged_only {
            let staged: HashSet<PathBuf> = self.get_staged_files().into_iter().collect();
            selected.retain(|f| staged.contains(f));
        }

        if let Some(ref reference) = opts.since {
            let changed: HashSet<PathBuf> =
                self.get_changed_files(reference).into_iter().collect();
            selected.retain(|f| changed.contains(f));
        }

        if opts.respect_gitignore {
            selected.retain(|f| {
                let ignored = self.should_ignore_file(f);
                if ignored {
                    debug!("Skipping gitignored file {}", f.display());
                }
                !ignored
            });
        }

        let mut seen = HashSet::new();
        selected.retain(|f| seen.insert(f.clone()));
        selected
    }

    /// Expand explicit inputs: directories become the source files beneath them.
    pub fn expand_inputs(&self, inputs: &[PathBuf]) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for input in inputs {
            let path = normalize_path(input, &self.cwd);
            if path.is_dir() {
                let walker = WalkDir::new(&path).into_iter().filter_entry(|e| {
                    !(e.file_type().is_dir()
                        && e.file_name()
                            .to_str()
                            .map(|n| SKIPPED_DIRS.contains(&n))
                            .unwrap_or(false))
                });
                files.extend(
                    walker
                        .filter_map(|e| e.ok())
                        .filter(|e| e.file_type().is_file() && is_source_file(e.path()))
                        .map(|e| e.into_path()),
                );
            } else {
                files.push(path);
            }
        }

        files
    }
}

fn detect(cwd: &Path) -> GitState {
    let root = match git::find_root(cwd) {
        Ok(root) => root,
        Err(e) => {
            debug!("Git awareness disabled: {}", e);
            return GitState {
                info: GitInfo::not_a_repository(),
                matcher: None,
            };
        }
    };

    let gitignore = root.join(".gitignore");
    let mut info = GitInfo {
        is_git_repository: true,
        git_root: Some(root.clone()),
        has_gitignore: gitignore.is_file(),
        gitignore_patterns: None,
    };

    if !info.has_gitignore {
        return GitState {
            info,
            matcher: None,
        };
    }

    info.gitignore_patterns = git::read_gitignore_patterns(&gitignore).ok();

    let mut builder = GitignoreBuilder::new(&root);
    if let Some(err) = builder.add(&gitignore) {
        warn!("Partially invalid .gitignore at {}: {}", gitignore.display(), err);
    }
    let matcher = match builder.build() {
        Ok(m) => Some(m),
        Err(e) => {
            warn!("Ignoring unreadable .gitignore: {}", e);
            None
        }
    };

    GitState { info, matcher }
}
