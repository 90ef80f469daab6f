//! Missing-value detection.

use super::{PatternDetector, bounded_examples};
use crate::config::WorkflowConfig;
use crate::error::Result;
use crate::types::{DetectedPattern, PatternType, Severity};
use polars::prelude::*;

/// Tokens that count as missing after trimming and lowercasing.
const MISSING_TOKENS: &[&str] = &[
    "", "null", "nil", "na", "n/a", "nan", "none", "-", "--", ".", "unknown", "undefined",
    "missing",
];

/// Check whether a literal value is one of the recognized missing markers.
///
/// Comparison is case-insensitive on the trimmed value.
pub fn is_missing_token(value: &str) -> bool {
    let normalized = value.trim().to_lowercase();
    MISSING_TOKENS.contains(&normalized.as_str())
}

/// Detects columns with a meaningful share of missing values, counting both
/// actual nulls and the placeholder tokens real datasets use for them.
pub struct MissingValueDetector;

impl PatternDetector for MissingValueDetector {
    fn name(&self) -> &'static str {
        "missing_values"
    }

    fn is_applicable(&self, _column: &Series) -> bool {
        true
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

        let mut missing = column.null_count();
        let mut token_examples: Vec<String> = Vec::new();

        if let Ok(ca) = column.str() {
            for value in ca.into_iter().flatten() {
                if is_missing_token(value) {
                    missing += 1;
                    token_examples.push(format!("{:?}", value));
                }
            }
        }

        let ratio = missing as f64 / total as f64;
        if missing == 0 || ratio < config.min_affected_percentage {
            return Ok(Vec::new());
        }

        let severity = if ratio > 0.10 {
            Severity::High
        } else if ratio > 0.05 {
            Severity::Medium
        } else {
            Severity::Low
        };

        Ok(vec![DetectedPattern {
            pattern_type: PatternType::MissingValues,
            column_name: column.name().to_string(),
            description: format!(
                "{:.1}% of values in '{}' are missing ({} of {})",
                ratio * 100.0,
                column.name(),
                missing,
                total
            ),
            // More missing means less trust in any blanket strategy.
            confidence: (1.0 - ratio).clamp(0.0, 1.0),
            severity,
            occurrences: missing,
            affected_percentage: ratio,
            suggested_fix: "choose a missing-value strategy (impute, drop, or keep)".to_string(),
            examples: bounded_examples(token_examples),
        }])
    }
}
