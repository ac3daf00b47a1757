//! Quality checking: engines, aggregation and classification.
//!
//! - [`issue`] - Canonical issue model and result types
//! - [`engines`] - Tool adapters behind the [`Engine`] trait
//! - [`aggregator`] - Runs engines and folds their results
//! - [`classifier`] - Maps issues to remediation tiers
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐
//! │  ResultAggregator  │
//! │                    │
//! │  - run()           │
//! └─────────┬──────────┘
//!           │
//!     ┌─────┼──────────┐
//!     │     │          │
//!     ▼     ▼          ▼
//! ┌──────┐ ┌──────┐ ┌────────┐
//! │ Type │ │ Lint │ │ Format │
//! │Engine│ │Engine│ │ Engine │
//! └──────┘ └──────┘ └────────┘
//!           │
//!           ▼
//! ┌────────────────────┐
//! │  IssueClassifier   │
//! │                    │
//! │  - classify()      │
//! └────────────────────┘
//! ```

pub mod aggregator;
pub mod classifier;
pub mod engines;
pub mod issue;

pub use aggregator::{AggregatorConfig, ResultAggregator};
pub use classifier::{
    Action, Classification, ClassificationRules, ClassifiedIssue, Education, IssueClassifier,
    Remediation, Tier,
};
pub use engines::{Engine, EngineContext, FormatEngine, LintEngine, TypeEngine};
pub use issue::{CheckerResult, Issue, QualityCheckResult, Severity, Tool, INTERNAL_ERROR_RULE};
