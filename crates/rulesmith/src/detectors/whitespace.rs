//! Whitespace-issue detection.

use super::{PatternDetector, bounded_examples};
use crate::config::WorkflowConfig;
use crate::error::Result;
use crate::types::{DetectedPattern, PatternType, Severity};
use polars::prelude::*;

/// Detects values with leading/trailing whitespace or runs of consecutive
/// whitespace characters. Trim-and-collapse is always safe, so the emitted
/// pattern carries a fixed confidence of 1.0.
pub struct WhitespaceDetector;

/// A value has a whitespace issue if it differs from its trimmed form or
/// contains two or more consecutive whitespace characters.
fn has_whitespace_issue(value: &str) -> bool {
    if value != value.trim() {
        return true;
    }
    let mut prev_ws = false;
    for c in value.chars() {
        let ws = c.is_whitespace();
        if ws && prev_ws {
            return true;
        }
        prev_ws = ws;
    }
    false
}

impl PatternDetector for WhitespaceDetector {
    fn name(&self) -> &'static str {
        "whitespace"
    }

    fn is_applicable(&self, column: &Series) -> bool {
        matches!(column.dtype(), DataType::String)
    }

    fn detect(
        &self,
        column: &Series,
        config: &WorkflowConfig,
    ) -> Result<Vec<DetectedPattern>> {
        let total = column.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let ca = column.str()?;
        let mut occurrences = 0usize;
        let mut examples = Vec::new();

        for value in ca.into_iter().flatten() {
            if has_whitespace_issue(value) {
                occurrences += 1;
                examples.push(format!("{:?}", value));
            }
        }

        let ratio = occurrences as f64 / total as f64;
        if occurrences == 0 || ratio < config.min_affected_percentage {
            return Ok(Vec::new());
        }

        Ok(vec![DetectedPattern {
            pattern_type: PatternType::WhitespaceIssues,
            column_name: column.name().to_string(),
            description: format!(
                "{} value(s) in '{}' have stray or repeated whitespace",
                occurrences,
                column.name()
            ),
            confidence: 1.0,
            severity: Severity::Low,
            occurrences,
            affected_percentage: ratio,
            suggested_fix: "trim leading/trailing whitespace and collapse repeated whitespace"
                .to_string(),
            examples: bounded_examples(examples),
        }])
    }
}
