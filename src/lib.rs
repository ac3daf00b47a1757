//! quality-check - multi-engine quality checks for TypeScript/JavaScript projects
//!
//! Runs a type checker, a linter and a formatter over a set of files,
//! normalizes their diagnostics into one issue model, classifies each issue
//! into a remediation tier and reports the result for humans, CI or an
//! automated agent.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`config`] - Project configuration loading and environment overrides
//! - [`error`] - Error taxonomy and exit codes
//! - [`cache`] - Lock-protected on-disk caches for the engines
//! - [`selection`] - File selection with git awareness
//! - [`quality`] - Engines, aggregation and classification
//! - [`report`] - CLI, JSON and agent reporters
//! - [`pipeline`] - End-to-end check orchestration
//! - [`hook`] - stdin hook protocol
//!
//! # Example
//!
//! ```rust,ignore
//! use quality_check::pipeline::{CheckRequest, QualityChecker};
//! use quality_check::report::ReportOptions;
//!
//! let checker = QualityChecker::new(".")?;
//! let outcome = checker.check(CheckRequest::file("src/index.ts")).await;
//! print!("{}", outcome.render(&ReportOptions::default()));
//! std::process::exit(outcome.exit_code());
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod hook;
pub mod pipeline;
pub mod quality;
pub mod report;
pub mod selection;

// Re-export commonly used types
pub use error::{QualityError, Result};

pub use config::ProjectConfig;

pub use pipeline::{CheckOutcome, CheckRequest, QualityChecker};

pub use quality::{
    Classification, ClassifiedIssue, Engine, Issue, IssueClassifier, QualityCheckResult,
    ResultAggregator, Severity, Tier, Tool,
};

pub use report::{AgentMode, OutputFormat, ReportOptions};

pub use selection::{FileSelector, FilterOptions, GitInfo};
