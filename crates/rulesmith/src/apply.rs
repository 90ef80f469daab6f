//! Hand-off seam between the workflow and a rule-application engine.
//!
//! The workflow itself never rewrites data. It hands each approved rule to
//! a `RuleApplicator` and records what came back.

use crate::error::Result;
use crate::types::PreprocessingRule;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// Result of applying one rule to a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub rule_id: String,
    pub success: bool,
    pub rows_affected: usize,
    pub message: String,
}

impl ApplyOutcome {
    pub fn success(rule: &PreprocessingRule, rows_affected: usize, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule.id.clone(),
            success: true,
            rows_affected,
            message: message.into(),
        }
    }

    pub fn failure(rule: &PreprocessingRule, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule.id.clone(),
            success: false,
            rows_affected: 0,
            message: message.into(),
        }
    }
}

/// Applies one approved rule to a frame.
///
/// `Err` means the applicator itself broke; an `ApplyOutcome` with
/// `success: false` means the rule was tried and did not take.
pub trait RuleApplicator: Send + Sync {
    fn apply(&self, rule: &PreprocessingRule, df: &DataFrame) -> Result<ApplyOutcome>;
}
