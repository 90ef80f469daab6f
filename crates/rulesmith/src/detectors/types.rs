//! Type-inconsistency detection for columns mixing numeric and text values.

use super::{PatternDetector, bounded_examples, is_missing_token};
use crate::config::WorkflowConfig;
use crate::error::Result;
use crate::types::{DetectedPattern, PatternType, Severity};
use polars::prelude::*;

/// Flags string columns whose non-empty values are a genuine mix of numeric
/// and text: the numeric share must fall strictly between 10% and 90% for
/// the mix to be worth a human decision.
pub struct TypeInconsistencyDetector;

fn is_numeric_string(value: &str) -> bool {
    value.trim().parse::<f64>().is_ok()
}

impl PatternDetector for TypeInconsistencyDetector {
    fn name(&self) -> &'static str {
        "type_inconsistency"
    }

    fn is_applicable(&self, column: &Series) -> bool {
        matches!(column.dtype(), DataType::String)
    }

    fn detect(
        &self,
        column: &Series,
        config: &WorkflowConfig,
    ) -> Result<Vec<DetectedPattern>> {
        let ca = column.str()?;

        let mut numeric = 0usize;
        let mut text = 0usize;
        let mut text_examples = Vec::new();
        let mut numeric_examples = Vec::new();

        for value in ca.into_iter().flatten() {
            if is_missing_token(value) {
                continue; // empty class, ignored for the ratio
            }
            if is_numeric_string(value) {
                numeric += 1;
                numeric_examples.push(value.to_string());
            } else {
                text += 1;
                text_examples.push(value.to_string());
            }
        }

        let non_empty = numeric + text;
        if non_empty == 0 {
            return Ok(Vec::new());
        }

        let numeric_ratio = numeric as f64 / non_empty as f64;
        if numeric_ratio <= 0.10 || numeric_ratio >= 0.90 {
            return Ok(Vec::new());
        }

        // The minority side is the affected share.
        let minority = numeric.min(text);
        let affected = minority as f64 / column.len() as f64;
        if affected < config.min_affected_percentage {
            return Ok(Vec::new());
        }

        let (suggested_fix, examples) = if numeric_ratio >= 0.5 {
            (
                "convert to numeric (majority of values are numeric)",
                text_examples,
            )
        } else {
            (
                "convert to text (majority of values are text)",
                numeric_examples,
            )
        };

        Ok(vec![DetectedPattern {
            pattern_type: PatternType::TypeInconsistency,
            column_name: column.name().to_string(),
            description: format!(
                "'{}' mixes types: {:.0}% numeric, {:.0}% text",
                column.name(),
                numeric_ratio * 100.0,
                (1.0 - numeric_ratio) * 100.0
            ),
            confidence: numeric_ratio.max(1.0 - numeric_ratio),
            severity: Severity::Medium,
            occurrences: minority,
            affected_percentage: affected,
            suggested_fix: suggested_fix.to_string(),
            examples: bounded_examples(examples),
        }])
    }
}
