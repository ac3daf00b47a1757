//! Issue classification into remediation tiers.
//!
//! Every issue is classified on its own, by rule id (else diagnostic code),
//! against a data-driven rule table. Tiers are tried in a fixed order and the
//! first match wins:
//!
//! 1. **auto-fixable** - mechanical concerns, fixed silently
//! 2. **agent-fixable** - simple semantic problems, blocked with an instruction
//! 3. **human-required** - everything else, stopped with an explanation
//!
//! The default table is embedded; a rules file may replace it or, with
//! `"extend": true`, add to it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::issue::{Issue, Tool};
use crate::error::{QualityError, Result};

const DEFAULT_RULES: &str = include_str!("default_rules.json");

/// Rule key used for format-engine issues that carry no rule id.
const FORMAT_RULE_KEY: &str = "prettier/prettier";

// ============================================================================
// Payloads
// ============================================================================

/// Instruction attached to an agent-fixable issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Remediation {
    pub instruction: String,
    pub before: String,
    pub after: String,
}

/// Explanation attached to a human-required issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Education {
    pub concern: String,
    pub learn_more: String,
    pub next_step: String,
}

// ============================================================================
// Tiers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    AutoFixable,
    AgentFixable,
    HumanRequired,
}

impl Tier {
    #[must_use]
    pub fn action(&self) -> Action {
        match self {
            Self::AutoFixable => Action::SilentFix,
            Self::AgentFixable => Action::BlockAndInstruct,
            Self::HumanRequired => Action::StopAndEducate,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoFixable => "auto-fixable",
            Self::AgentFixable => "agent-fixable",
            Self::HumanRequired => "human-required",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller must do with an issue of a given tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    SilentFix,
    BlockAndInstruct,
    StopAndEducate,
}

impl Action {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SilentFix => "silent-fix",
            Self::BlockAndInstruct => "block-and-instruct",
            Self::StopAndEducate => "stop-and-educate",
        }
    }

    /// Whether an error carrying this action stops the run.
    #[must_use]
    pub fn blocks(&self) -> bool {
        !matches!(self, Self::SilentFix)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tier together with its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tier", rename_all = "kebab-case")]
pub enum Classification {
    AutoFixable,
    AgentFixable(Remediation),
    HumanRequired(Education),
}

impl Classification {
    #[must_use]
    pub fn tier(&self) -> Tier {
        match self {
            Self::AutoFixable => Tier::AutoFixable,
            Self::AgentFixable(_) => Tier::AgentFixable,
            Self::HumanRequired(_) => Tier::HumanRequired,
        }
    }

    #[must_use]
    pub fn action(&self) -> Action {
        self.tier().action()
    }
}

/// An issue paired with its classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedIssue {
    #[serde(flatten)]
    pub issue: Issue,
    pub classification: Classification,
}

impl ClassifiedIssue {
    /// An error whose tier needs an agent or a human. Auto-fixable errors
    /// are fixed silently and never block.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.issue.severity.is_blocking() && self.classification.action().blocks()
    }
}

// ============================================================================
// Rule table
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RulesFile {
    #[serde(default)]
    extend: bool,
    #[serde(default)]
    auto_fixable: Vec<String>,
    #[serde(default)]
    agent_fixable: BTreeMap<String, Remediation>,
    #[serde(default)]
    human_required: BTreeMap<String, Education>,
    #[serde(default)]
    fallback: Option<Education>,
}

/// Rule id to tier mapping.
#[derive(Debug, Clone)]
pub struct ClassificationRules {
    auto_fixable: BTreeSet<String>,
    agent_fixable: BTreeMap<String, Remediation>,
    human_required: BTreeMap<String, Education>,
    fallback: Education,
}

impl ClassificationRules {
    /// The embedded default table.
    #[must_use]
    pub fn defaults() -> Self {
        let file: RulesFile =
            serde_json::from_str(DEFAULT_RULES).expect("embedded rules are valid JSON");
        Self::from_file(file, None)
    }

    fn from_file(file: RulesFile, base: Option<Self>) -> Self {
        let default_fallback = || Education {
            concern: "This issue needs human judgement.".to_string(),
            learn_more: "See the documentation for the reported rule.".to_string(),
            next_step: "Review the finding before changing the code.".to_string(),
        };

        match base {
            Some(mut rules) => {
                rules.auto_fixable.extend(file.auto_fixable);
                rules.agent_fixable.extend(file.agent_fixable);
                rules.human_required.extend(file.human_required);
                if let Some(fallback) = file.fallback {
                    rules.fallback = fallback;
                }
                rules
            }
            None => Self {
                auto_fixable: file.auto_fixable.into_iter().collect(),
                agent_fixable: file.agent_fixable,
                human_required: file.human_required,
                fallback: file.fallback.unwrap_or_else(default_fallback),
            },
        }
    }

    /// Parse a rules document. `"extend": true` merges it into the defaults.
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        let file: RulesFile = serde_json::from_str(json)?;
        let base = file.extend.then(Self::defaults);
        Ok(Self::from_file(file, base))
    }

    /// Load from `path`, or the defaults when no path is configured.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::defaults());
        };

        let content = std::fs::read_to_string(path).map_err(|e| QualityError::InvalidRules {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let rules = Self::from_json(&content).map_err(|e| QualityError::InvalidRules {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!("Loaded classifier rules from {}", path.display());
        Ok(rules)
    }

    /// Number of rule ids with an explicit tier.
    #[must_use]
    pub fn len(&self) -> usize {
        self.auto_fixable.len() + self.agent_fixable.len() + self.human_required.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ClassificationRules {
    fn default() -> Self {
        Self::defaults()
    }
}

// ============================================================================
// Classifier
// ============================================================================

/// Maps issues to tiers. Holds no per-issue state.
#[derive(Debug, Clone, Default)]
pub struct IssueClassifier {
    rules: ClassificationRules,
}

impl IssueClassifier {
    #[must_use]
    pub fn new(rules: ClassificationRules) -> Self {
        Self { rules }
    }

    /// Classify a rule id or diagnostic code directly.
    #[must_use]
    pub fn classify_key(&self, key: Option<&str>) -> Classification {
        let Some(key) = key else {
            return Classification::HumanRequired(self.rules.fallback.clone());
        };

        if self.rules.auto_fixable.contains(key) {
            return Classification::AutoFixable;
        }
        if let Some(remediation) = self.rules.agent_fixable.get(key) {
            return Classification::AgentFixable(remediation.clone());
        }
        Classification::HumanRequired(
            self.rules
                .human_required
                .get(key)
                .unwrap_or(&self.rules.fallback)
                .clone(),
        )
    }

    #[must_use]
    pub fn classify(&self, issue: &Issue) -> Classification {
        let key = issue.rule_key().or(match issue.tool {
            Tool::Format => Some(FORMAT_RULE_KEY),
            _ => None,
        });
        self.classify_key(key)
    }

    #[must_use]
    pub fn classify_all(&self, issues: &[Issue]) -> Vec<ClassifiedIssue> {
        issues
            .iter()
            .map(|issue| ClassifiedIssue {
                issue: issue.clone(),
                classification: self.classify(issue),
            })
            .collect()
    }
}
