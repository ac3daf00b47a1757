//! JSON reporter: the result serialized with its stable field order.

use tracing::warn;

use super::Reporter;
use crate::quality::{ClassifiedIssue, QualityCheckResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReporter;

impl Reporter for JsonReporter {
    fn report(&self, result: &QualityCheckResult, _classified: &[ClassifiedIssue]) -> String {
        if result.issues().is_empty() {
            return String::new();
        }
        serde_json::to_string_pretty(result).unwrap_or_else(|e| {
            warn!("Failed to serialize result: {}", e);
            String::new()
        })
    }
}
