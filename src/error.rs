//! Custom error types for quality checks.
//!
//! Diagnostics found by an engine are data, never errors. The variants here
//! cover environment-level failures (soft skips), untrusted input rejected by
//! the hook, and internal failures that surface with their own exit code.

use std::path::PathBuf;
use thiserror::Error;

/// Exit code when every check passed or there was nothing to do.
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for an unexpected internal failure.
pub const EXIT_INTERNAL_ERROR: i32 = 1;

/// Exit code when quality issues block the change.
pub const EXIT_QUALITY_ISSUES: i32 = 2;

/// Main error type for quality-check operations
#[derive(Error, Debug)]
pub enum QualityError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Failed to load configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Engine configuration (tsconfig, eslint config) could not be found
    #[error("No {engine} configuration found for {}", file.display())]
    MissingEngineConfig { engine: String, file: PathBuf },

    /// Classifier rule table could not be parsed
    #[error("Invalid classifier rules in {}: {reason}", path.display())]
    InvalidRules { path: PathBuf, reason: String },

    // =========================================================================
    // Tool Errors
    // =========================================================================
    /// Missing required tool
    #[error("Missing required tool: {tool}")]
    MissingTool { tool: String },

    /// Tool execution failed
    #[error("Tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    /// Git operation failed
    #[error("Git operation failed: {operation} - {message}")]
    Git { operation: String, message: String },

    // =========================================================================
    // Hook Errors
    // =========================================================================
    /// Hook payload rejected
    #[error("Invalid hook payload: {reason}")]
    HookPayload { reason: String },

    /// Reading the hook payload did not finish in time
    #[error("Timed out reading hook input after {seconds}s")]
    StdinTimeout { seconds: u64 },

    // =========================================================================
    // Cache Errors
    // =========================================================================
    /// Cache could not be read or written
    #[error("Cache error at {}: {message}", path.display())]
    Cache { path: PathBuf, message: String },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl QualityError {
    // =========================================================================
    // Constructor helpers
    // =========================================================================

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    /// Create a git error
    pub fn git(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Git {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a tool execution error
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a hook payload error
    pub fn hook_payload(reason: impl Into<String>) -> Self {
        Self::HookPayload {
            reason: reason.into(),
        }
    }

    /// Create a cache error
    pub fn cache(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Cache {
            path: path.into(),
            message: message.into(),
        }
    }

    // =========================================================================
    // Classification helpers
    // =========================================================================

    /// Environment-level failures that skip one engine instead of failing the run.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            Self::MissingTool { .. } | Self::MissingEngineConfig { .. } | Self::Cache { .. }
        )
    }

    /// Input rejected before any work started; degrades to a no-op.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::HookPayload { .. })
    }

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        if self.is_validation() {
            EXIT_SUCCESS
        } else {
            EXIT_INTERNAL_ERROR
        }
    }
}

/// Type alias for quality-check results
pub type Result<T> = std::result::Result<T, QualityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QualityError::MissingEngineConfig {
            engine: "TypeScript".into(),
            file: PathBuf::from("src/a.ts"),
        };
        assert!(err.to_string().contains("TypeScript"));
        assert!(err.to_string().contains("src/a.ts"));
    }

    #[test]
    fn test_is_soft() {
        assert!(QualityError::MissingTool {
            tool: "eslint".into()
        }
        .is_soft());
        assert!(QualityError::cache("/tmp/x", "locked").is_soft());
        assert!(!QualityError::tool("tsc", "crashed").is_soft());
        assert!(!QualityError::hook_payload("no tool").is_soft());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(QualityError::hook_payload("bad json").exit_code(), 0);
        assert_eq!(QualityError::tool("tsc", "crashed").exit_code(), 1);
        assert_eq!(QualityError::config("broken").exit_code(), 1);
        assert_ne!(EXIT_QUALITY_ISSUES, EXIT_INTERNAL_ERROR);
    }

    #[test]
    fn test_config_with_path() {
        let path = PathBuf::from("/test/.quality-check.json");
        let err = QualityError::config_with_path("failed to parse", path.clone());
        if let QualityError::Config {
            message,
            path: opt_path,
        } = err
        {
            assert_eq!(message, "failed to parse");
            assert_eq!(opt_path, Some(path));
        } else {
            panic!("Wrong error variant");
        }
    }

    #[test]
    fn test_git_error() {
        let err = QualityError::git("diff --cached", "not a git repository");
        if let QualityError::Git { operation, message } = err {
            assert_eq!(operation, "diff --cached");
            assert_eq!(message, "not a git repository");
        } else {
            panic!("Wrong error variant");
        }
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: QualityError = io_err.into();
        assert!(matches!(err, QualityError::Io(_)));
        assert!(err.to_string().contains("access denied"));
    }
}
