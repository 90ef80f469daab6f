//! Encoding anomaly detection: replacement characters and mojibake left
//! behind by a wrong decode (typically UTF-8 read as Latin-1).

use super::{PatternDetector, bounded_examples};
use crate::config::WorkflowConfig;
use crate::error::Result;
use crate::types::{DetectedPattern, PatternType, Severity};
use polars::prelude::*;

/// Byte sequences that show up when UTF-8 multibyte text is decoded as a
/// single-byte encoding.
const MOJIBAKE_MARKERS: [&str; 3] = ["Ã", "â€", "Â"];

pub(crate) fn has_encoding_anomaly(value: &str) -> bool {
    value.contains('\u{FFFD}') || MOJIBAKE_MARKERS.iter().any(|m| value.contains(m))
}

pub struct EncodingAnomalyDetector;

impl PatternDetector for EncodingAnomalyDetector {
    fn name(&self) -> &'static str {
        "encoding_anomaly"
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

        let mut affected = 0usize;
        let mut examples = Vec::new();
        for value in ca.into_iter().flatten() {
            if has_encoding_anomaly(value) {
                affected += 1;
                examples.push(value.to_string());
            }
        }

        if affected == 0 {
            return Ok(Vec::new());
        }

        let ratio = affected as f64 / column.len() as f64;
        if ratio < config.min_affected_percentage {
            return Ok(Vec::new());
        }

        Ok(vec![DetectedPattern {
            pattern_type: PatternType::EncodingAnomaly,
            column_name: column.name().to_string(),
            description: format!(
                "'{}' has {} value(s) with replacement characters or mojibake",
                column.name(),
                affected
            ),
            confidence: (1.0 - ratio).max(0.5),
            severity: Severity::Medium,
            occurrences: affected,
            affected_percentage: ratio,
            suggested_fix: "re-decode affected values as UTF-8".to_string(),
            examples: bounded_examples(examples),
        }])
    }
}
