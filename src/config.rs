//! Configuration management for quality checks.
//!
//! Settings are read from `<project>/.quality-check.json`, then from the
//! user-level `<config dir>/quality-check/config.json`, then defaults.
//! A handful of environment variables override cache and rule locations.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{QualityError, Result};

/// Overrides the type-checker cache directory.
pub const ENV_TSC_CACHE_DIR: &str = "QUALITY_CHECK_TSC_CACHE_DIR";

/// Overrides the lint cache location.
pub const ENV_ESLINT_CACHE: &str = "QUALITY_CHECK_ESLINT_CACHE";

/// Overrides the classifier rules file.
pub const ENV_RULES_FILE: &str = "QUALITY_CHECK_RULES";

/// Project-level settings file name.
pub const SETTINGS_FILE: &str = ".quality-check.json";

/// File extensions the engines are run against.
pub const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];

/// Check whether a path has a supported source extension.
pub fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SOURCE_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    #[serde(default)]
    pub typescript: TypeScriptConfig,

    #[serde(default)]
    pub eslint: EslintConfig,

    #[serde(default)]
    pub prettier: PrettierConfig,

    /// Drop files matched by the repository's `.gitignore`.
    #[serde(default = "default_true")]
    pub respect_gitignore: bool,

    /// Let engines write fixes back (format and lint autofix).
    #[serde(default)]
    pub autofix: bool,

    /// Run engines concurrently.
    #[serde(default = "default_true")]
    pub parallel_engines: bool,

    /// Per-engine timeout in milliseconds.
    #[serde(default = "default_engine_timeout_ms")]
    pub engine_timeout_ms: u64,

    /// Custom classifier rules (JSON).
    #[serde(default)]
    pub rules_file: Option<PathBuf>,

    #[serde(default)]
    pub report: ReportConfig,
}

fn default_true() -> bool {
    true
}

fn default_engine_timeout_ms() -> u64 {
    30_000
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            typescript: TypeScriptConfig::default(),
            eslint: EslintConfig::default(),
            prettier: PrettierConfig::default(),
            respect_gitignore: true, // Match the serde default
            autofix: false,
            parallel_engines: true,
            engine_timeout_ms: default_engine_timeout_ms(),
            rules_file: None,
            report: ReportConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeScriptConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Explicit cache directory; the env override and temp fallback apply otherwise.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for TypeScriptConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EslintConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Use eslint's on-disk cache.
    #[serde(default = "default_true")]
    pub cache: bool,

    #[serde(default)]
    pub cache_location: Option<PathBuf>,

    /// Create stub modules for unresolved relative imports in test files.
    #[serde(default = "default_true")]
    pub synthesize_stubs: bool,

    /// Globs that identify test files.
    #[serde(default = "default_test_patterns")]
    pub test_patterns: Vec<String>,
}

pub fn default_test_patterns() -> Vec<String> {
    vec![
        "**/*.test.*".to_string(),
        "**/*.spec.*".to_string(),
        "**/__tests__/**".to_string(),
    ]
}

impl Default for EslintConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache: true,
            cache_location: None,
            synthesize_stubs: true,
            test_patterns: default_test_patterns(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrettierConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for PrettierConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportConfig {
    /// Maximum issues rendered by the CLI reporter before "... and N more".
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Render every issue in full instead of one line per issue.
    #[serde(default)]
    pub verbose: bool,
}

fn default_max_items() -> usize {
    20
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            verbose: false,
        }
    }
}

impl ProjectConfig {
    /// Load configuration for a project directory.
    ///
    /// The project file wins over the user file; both absent means defaults.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let candidates = [
            Some(Self::settings_path(project_dir)),
            Self::user_settings_path(),
        ];

        for path in candidates.into_iter().flatten() {
            if path.exists() {
                let content = std::fs::read_to_string(&path)?;
                return serde_json::from_str(&content).map_err(|e| {
                    QualityError::config_with_path(e.to_string(), path.clone())
                });
            }
        }

        Ok(Self::default())
    }

    /// Get the settings file path for a project
    pub fn settings_path(project_dir: &Path) -> PathBuf {
        project_dir.join(SETTINGS_FILE)
    }

    /// User-level settings file, if the platform has a config directory.
    pub fn user_settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("quality-check").join("config.json"))
    }

    /// Type-checker cache directory: config, then env, then process temp.
    pub fn tsc_cache_dir(&self) -> PathBuf {
        self.typescript
            .cache_dir
            .clone()
            .or_else(|| std::env::var_os(ENV_TSC_CACHE_DIR).map(PathBuf::from))
            .unwrap_or_else(|| std::env::temp_dir().join("quality-check").join("tsc"))
    }

    /// Lint cache location: config, then env, then a project-local folder.
    pub fn eslint_cache_dir(&self, project_dir: &Path) -> PathBuf {
        self.eslint
            .cache_location
            .clone()
            .or_else(|| std::env::var_os(ENV_ESLINT_CACHE).map(PathBuf::from))
            .unwrap_or_else(|| {
                project_dir
                    .join("node_modules")
                    .join(".cache")
                    .join("quality-check")
                    .join("eslint")
            })
    }

    /// Classifier rules file: env wins over config.
    pub fn rules_path(&self, project_dir: &Path) -> Option<PathBuf> {
        std::env::var_os(ENV_RULES_FILE)
            .map(PathBuf::from)
            .or_else(|| self.rules_file.clone())
            .map(|p| if p.is_absolute() { p } else { project_dir.join(p) })
    }
}
