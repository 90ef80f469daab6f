//! Statistical outlier detection for numeric columns.

use super::{PatternDetector, bounded_examples};
use crate::config::WorkflowConfig;
use crate::error::Result;
use crate::stats::{self, is_numeric_dtype};
use crate::types::{DetectedPattern, PatternType, Severity};
use polars::prelude::*;

/// Minimum numeric values a column needs before the standard deviation is
/// meaningful enough to call anything an outlier.
const MIN_VALUES: usize = 10;

/// Flags numeric values farther than `outlier_std_multiplier` standard
/// deviations from the column mean.
pub struct OutlierDetector;

impl PatternDetector for OutlierDetector {
    fn name(&self) -> &'static str {
        "outliers"
    }

    fn is_applicable(&self, column: &Series) -> bool {
        is_numeric_dtype(column.dtype())
    }

    fn detect(
        &self,
        column: &Series,
        config: &WorkflowConfig,
    ) -> Result<Vec<DetectedPattern>> {
        let values = stats::numeric_values(column)?;
        if values.len() < MIN_VALUES {
            return Ok(Vec::new());
        }

        let mean = stats::mean(&values);
        let std = stats::std_dev(&values);
        if std <= 0.0 {
            return Ok(Vec::new());
        }

        let threshold = config.outlier_std_multiplier * std;
        let outliers: Vec<f64> = values
            .iter()
            .copied()
            .filter(|v| (v - mean).abs() > threshold)
            .collect();

        if outliers.is_empty() {
            return Ok(Vec::new());
        }

        let ratio = outliers.len() as f64 / column.len() as f64;
        if ratio < config.min_affected_percentage {
            return Ok(Vec::new());
        }

        // IQR bounds give the reviewer a concrete cap target.
        let suggested_fix = match stats::quartiles(&values) {
            Some(q) => format!(
                "review outliers: remove, cap to [{:.2}, {:.2}], or keep",
                q.q1 - 1.5 * q.iqr(),
                q.q3 + 1.5 * q.iqr()
            ),
            None => "review outliers: remove, cap, or keep".to_string(),
        };

        Ok(vec![DetectedPattern {
            pattern_type: PatternType::Outliers,
            column_name: column.name().to_string(),
            description: format!(
                "'{}' has {} value(s) beyond {:.1} standard deviations (mean {:.2}, std {:.2}, skewness {:.2})",
                column.name(),
                outliers.len(),
                config.outlier_std_multiplier,
                mean,
                std,
                stats::skewness(&values)
            ),
            confidence: 1.0 - ratio,
            severity: if ratio > 0.05 {
                Severity::Medium
            } else {
                Severity::Low
            },
            occurrences: outliers.len(),
            affected_percentage: ratio,
            suggested_fix,
            examples: bounded_examples(outliers.iter().map(|v| v.to_string())),
        }])
    }
}
