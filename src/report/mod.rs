//! Rendering a [`QualityCheckResult`] for its consumers.
//!
//! Three reporters read the same result:
//!
//! - [`CliReporter`] - colored terminal output grouped by tool
//! - [`JsonReporter`] - the result serialized as-is
//! - [`AgentReporter`] - structured text for an automated agent, produced by
//!   an [`AgentFormatter`]
//!
//! Every reporter returns an empty string when the result has no issues.

pub mod agent;
pub mod cli;
pub mod json;

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::ReportConfig;
use crate::quality::{ClassifiedIssue, QualityCheckResult};

pub use agent::{AgentFormatter, AgentReporter, StructuredFormatter};
pub use cli::CliReporter;
pub use json::JsonReporter;

/// Output format selected on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Cli,
    Json,
    Agent,
}

/// Level of detail for agent output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    /// Counts per tier only.
    Summary,
    /// Every issue with full guidance, including before/after examples.
    Detailed,
    /// Blocking issues with their instruction or explanation.
    #[default]
    Default,
}

/// Renders one invocation's result.
pub trait Reporter {
    /// Render `result`; `classified` holds the same issues with their tiers.
    fn report(&self, result: &QualityCheckResult, classified: &[ClassifiedIssue]) -> String;
}

/// Options shared by the reporters.
#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    pub format: OutputFormat,
    pub agent_mode: AgentMode,
    pub max_items: usize,
    pub verbose: bool,
    /// Paths are shown relative to this root.
    pub root: Option<PathBuf>,
}

impl ReportOptions {
    /// Start from the configured report settings.
    #[must_use]
    pub fn from_config(config: &ReportConfig) -> Self {
        Self {
            max_items: config.max_items,
            verbose: config.verbose,
            ..Default::default()
        }
    }
}

/// Build the reporter for `options.format`.
#[must_use]
pub fn reporter_for(options: &ReportOptions) -> Box<dyn Reporter> {
    match options.format {
        OutputFormat::Cli => Box::new(
            CliReporter::new()
                .with_max_items(options.max_items)
                .with_verbose(options.verbose)
                .with_root(options.root.clone()),
        ),
        OutputFormat::Json => Box::new(JsonReporter),
        OutputFormat::Agent => Box::new(AgentReporter::new(
            Box::new(StructuredFormatter::new(options.root.clone())),
            options.agent_mode,
        )),
    }
}

/// Display form of `path`, relative to `root` when it is inside it.
pub(crate) fn display_path(path: &Path, root: Option<&Path>) -> String {
    root.and_then(|r| path.strip_prefix(r).ok())
        .unwrap_or(path)
        .display()
        .to_string()
}
