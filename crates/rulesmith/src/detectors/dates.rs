//! Date format variation detection across string columns.
//!
//! A column is flagged when at least two distinct date formats appear among
//! its values. Slash-separated dates are disambiguated by the day component:
//! a first component above 12 can only be a day. Values that fit both
//! interpretations are counted as day-first.

use super::{PatternDetector, bounded_examples, is_missing_token};
use crate::config::WorkflowConfig;
use crate::error::Result;
use crate::types::{DetectedPattern, PatternType, Severity};
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use std::collections::HashMap;

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").unwrap());
static SLASH_DMY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").unwrap());
static DASH_DMY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})-(\d{1,2})-(\d{4})$").unwrap());
static SLASH_YMD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})/(\d{1,2})/(\d{1,2})$").unwrap());
static COMPACT_YMD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})$").unwrap());

fn plausible(month: u32, day: u32) -> bool {
    (1..=12).contains(&month) && (1..=31).contains(&day)
}

/// Classifies a single value into a date format token, or None when the
/// value is not recognizably a date.
fn classify_format(value: &str) -> Option<&'static str> {
    let value = value.trim();

    if let Some(caps) = ISO_DATE.captures(value) {
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        return plausible(month, day).then_some("yyyy-MM-dd");
    }
    if let Some(caps) = SLASH_DMY.captures(value) {
        let a: u32 = caps[1].parse().ok()?;
        let b: u32 = caps[2].parse().ok()?;
        if a > 12 && plausible(b, a) {
            return Some("dd/MM/yyyy");
        }
        if b > 12 && plausible(a, b) {
            return Some("MM/dd/yyyy");
        }
        // Both components <= 12: ambiguous, counted as day-first.
        return plausible(b, a).then_some("dd/MM/yyyy");
    }
    if let Some(caps) = DASH_DMY.captures(value) {
        let a: u32 = caps[1].parse().ok()?;
        let b: u32 = caps[2].parse().ok()?;
        return (plausible(b, a) || plausible(a, b)).then_some("dd-MM-yyyy");
    }
    if let Some(caps) = SLASH_YMD.captures(value) {
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        return plausible(month, day).then_some("yyyy/MM/dd");
    }
    if let Some(caps) = COMPACT_YMD.captures(value) {
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        return plausible(month, day).then_some("yyyyMMdd");
    }
    None
}

pub struct DateFormatDetector;

impl PatternDetector for DateFormatDetector {
    fn name(&self) -> &'static str {
        "date_formats"
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

        let mut format_counts: HashMap<&'static str, usize> = HashMap::new();
        let mut matched = 0usize;
        let mut examples = Vec::new();

        for value in ca.into_iter().flatten() {
            if is_missing_token(value) {
                continue;
            }
            if let Some(format) = classify_format(value) {
                *format_counts.entry(format).or_insert(0) += 1;
                matched += 1;
                examples.push(format!("{value} ({format})"));
            }
        }

        if format_counts.len() < 2 {
            return Ok(Vec::new());
        }

        let ratio = matched as f64 / column.len() as f64;
        if ratio < config.min_affected_percentage {
            return Ok(Vec::new());
        }

        let mut formats: Vec<&str> = format_counts.keys().copied().collect();
        formats.sort_unstable();

        Ok(vec![DetectedPattern {
            pattern_type: PatternType::DateFormatVariation,
            column_name: column.name().to_string(),
            description: format!(
                "'{}' contains {} date formats: {}",
                column.name(),
                format_counts.len(),
                formats.join(", ")
            ),
            confidence: ratio,
            severity: Severity::Medium,
            occurrences: matched,
            affected_percentage: ratio,
            suggested_fix: "normalize all dates to ISO-8601 (yyyy-MM-dd)".to_string(),
            examples: bounded_examples(examples),
        }])
    }
}
