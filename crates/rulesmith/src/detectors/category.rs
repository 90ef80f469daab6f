//! Category variation detection: near-duplicate levels in low-cardinality
//! string columns, e.g. "Yes", "yes " and "YES".

use super::{PatternDetector, bounded_examples, is_missing_token};
use crate::config::WorkflowConfig;
use crate::error::Result;
use crate::stats;
use crate::types::{DetectedPattern, PatternType, Severity};
use polars::prelude::*;
use std::collections::HashMap;

pub struct CategoryVariationDetector;

fn canonical(value: &str) -> String {
    value.trim().to_lowercase()
}

impl PatternDetector for CategoryVariationDetector {
    fn name(&self) -> &'static str {
        "category_variation"
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

        let counts = stats::frequency_table(
            ca.into_iter().flatten().filter(|v| !is_missing_token(v)),
        );
        if counts.is_empty() {
            return Ok(Vec::new());
        }

        // canonical form -> occurrences per raw spelling
        let mut groups: HashMap<String, HashMap<String, usize>> = HashMap::new();
        for (raw, count) in counts {
            *groups.entry(canonical(&raw)).or_default().entry(raw).or_insert(0) += count;
        }

        if groups.len() > config.max_category_levels {
            return Ok(Vec::new());
        }

        // Count rows carrying a non-dominant spelling of their level.
        let mut variant_rows = 0usize;
        let mut collisions = 0usize;
        let mut examples = Vec::new();
        for spellings in groups.values() {
            if spellings.len() < 2 {
                continue;
            }
            collisions += 1;
            let dominant = spellings.values().copied().max().unwrap_or(0);
            let total: usize = spellings.values().sum();
            variant_rows += total - dominant;

            let mut raw: Vec<&str> = spellings.keys().map(String::as_str).collect();
            raw.sort_unstable();
            examples.push(raw.join(" / "));
        }

        if collisions == 0 {
            return Ok(Vec::new());
        }

        let ratio = variant_rows as f64 / column.len() as f64;
        if ratio < config.min_affected_percentage {
            return Ok(Vec::new());
        }

        examples.sort_unstable();

        let canonical_counts: HashMap<String, usize> = groups
            .iter()
            .map(|(level, spellings)| (level.clone(), spellings.values().sum()))
            .collect();

        Ok(vec![DetectedPattern {
            pattern_type: PatternType::CategoryVariation,
            column_name: column.name().to_string(),
            description: format!(
                "'{}' has {} category level(s) with inconsistent spellings ({} level(s), entropy {:.2} bits)",
                column.name(),
                collisions,
                groups.len(),
                stats::shannon_entropy(&canonical_counts)
            ),
            confidence: 1.0 - ratio,
            severity: Severity::Low,
            occurrences: variant_rows,
            affected_percentage: ratio,
            suggested_fix: "merge case and whitespace variants of each level".to_string(),
            examples: bounded_examples(examples),
        }])
    }
}
