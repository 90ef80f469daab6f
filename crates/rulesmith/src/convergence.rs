//! Stage-to-stage convergence detection over rule sets.

use crate::types::{ConvergenceInfo, PreprocessingRule};
use std::collections::HashMap;
use tracing::debug;

/// A matched rule counts as modified when its confidence moved by more than
/// this much between stages.
const CONFIDENCE_DELTA: f64 = 0.05;

/// Or when the share of rows it affects moved by more than this relative
/// amount. Shares are compared instead of raw row counts because counts come
/// from samples of very different sizes across stages.
const COVERAGE_DELTA: f64 = 0.10;

fn is_modified(previous: &PreprocessingRule, current: &PreprocessingRule) -> bool {
    if (previous.confidence - current.confidence).abs() > CONFIDENCE_DELTA {
        return true;
    }
    let base = previous.affected_percentage.max(f64::EPSILON);
    (previous.affected_percentage - current.affected_percentage).abs() / base > COVERAGE_DELTA
}

/// Compare two consecutive stages' rule sets, matching rules by signature.
///
/// `has_converged` requires a non-empty previous set; the first stage can
/// never report convergence.
pub fn compare(
    previous: &[PreprocessingRule],
    current: &[PreprocessingRule],
    threshold: f64,
) -> ConvergenceInfo {
    let prev_by_sig: HashMap<String, &PreprocessingRule> =
        previous.iter().map(|r| (r.signature(), r)).collect();
    let cur_sigs: Vec<String> = current.iter().map(|r| r.signature()).collect();

    let mut new_rules = 0;
    let mut modified_rules = 0;
    let mut stable_rules = 0;
    for (rule, sig) in current.iter().zip(&cur_sigs) {
        match prev_by_sig.get(sig) {
            None => new_rules += 1,
            Some(prev) if is_modified(prev, rule) => modified_rules += 1,
            Some(_) => stable_rules += 1,
        }
    }

    let removed_rules = previous
        .iter()
        .filter(|r| !cur_sigs.contains(&r.signature()))
        .count();

    let change_rate =
        (new_rules + modified_rules + removed_rules) as f64 / previous.len().max(1) as f64;
    let has_converged = !previous.is_empty() && change_rate <= threshold;

    debug!(
        new_rules,
        modified_rules, removed_rules, stable_rules, change_rate, "convergence check"
    );

    ConvergenceInfo {
        new_rules,
        modified_rules,
        removed_rules,
        stable_rules,
        change_rate,
        has_converged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PatternType, RuleType, Severity};

    fn rule(column: &str, confidence: f64, affected_rows: usize) -> PreprocessingRule {
        rule_with_coverage(column, confidence, affected_rows, 0.1)
    }

    fn rule_with_coverage(
        column: &str,
        confidence: f64,
        affected_rows: usize,
        affected_percentage: f64,
    ) -> PreprocessingRule {
        let column_names = vec![column.to_string()];
        let id = PreprocessingRule::compute_signature(
            RuleType::MissingValueStrategy,
            &column_names,
            PatternType::MissingValues,
        );
        PreprocessingRule {
            id,
            rule_type: RuleType::MissingValueStrategy,
            column_names,
            pattern_type: PatternType::MissingValues,
            transformation: "fill".to_string(),
            confidence,
            affected_rows,
            affected_percentage,
            severity: Severity::Medium,
            priority: 7,
            requires_hitl: true,
            is_approved: false,
            approved_by: None,
            discovered_in_stage: 1,
            examples: vec![],
        }
    }

    #[test]
    fn test_identical_sets_converge() {
        let rules = vec![rule("a", 0.8, 100), rule("b", 0.9, 50)];
        let info = compare(&rules, &rules, 0.02);
        assert_eq!(info.new_rules, 0);
        assert_eq!(info.modified_rules, 0);
        assert_eq!(info.removed_rules, 0);
        assert_eq!(info.stable_rules, 2);
        assert_eq!(info.change_rate, 0.0);
        assert!(info.has_converged);
    }

    #[test]
    fn test_empty_previous_never_converges() {
        let current = vec![rule("a", 0.8, 100)];
        let info = compare(&[], &current, 0.02);
        assert_eq!(info.new_rules, 1);
        assert_eq!(info.change_rate, 1.0);
        assert!(!info.has_converged);

        let empty_both = compare(&[], &[], 0.02);
        assert!(!empty_both.has_converged);
    }

    #[test]
    fn test_confidence_drift_counts_as_modified() {
        let previous = vec![rule("a", 0.80, 100)];
        // Within tolerance.
        let near = vec![rule("a", 0.84, 100)];
        assert_eq!(compare(&previous, &near, 0.02).stable_rules, 1);
        // Beyond tolerance.
        let far = vec![rule("a", 0.90, 100)];
        let info = compare(&previous, &far, 0.02);
        assert_eq!(info.modified_rules, 1);
        assert!(!info.has_converged);
    }

    #[test]
    fn test_coverage_drift_counts_as_modified() {
        let previous = vec![rule_with_coverage("a", 0.8, 100, 0.10)];
        // 8% relative coverage delta: stable.
        let near = vec![rule_with_coverage("a", 0.8, 108, 0.108)];
        assert_eq!(compare(&previous, &near, 0.02).stable_rules, 1);
        // 25% relative coverage delta: modified.
        let far = vec![rule_with_coverage("a", 0.8, 125, 0.125)];
        assert_eq!(compare(&previous, &far, 0.02).modified_rules, 1);
    }

    #[test]
    fn test_stable_coverage_across_growing_samples_stays_stable() {
        // The same defect seen in progressively larger samples: absolute row
        // counts grow tenfold between stages while the share stays put. The
        // rule must count as stable, not modified.
        let stage1 = vec![rule_with_coverage("a", 0.92, 12, 0.12)];
        let stage2 = vec![rule_with_coverage("a", 0.92, 121, 0.121)];
        let stage3 = vec![rule_with_coverage("a", 0.92, 1198, 0.1198)];

        let info = compare(&stage1, &stage2, 0.02);
        assert_eq!(info.stable_rules, 1);
        assert_eq!(info.modified_rules, 0);
        assert!(info.has_converged);

        let info = compare(&stage2, &stage3, 0.02);
        assert_eq!(info.stable_rules, 1);
        assert_eq!(info.change_rate, 0.0);
        assert!(info.has_converged);
    }

    #[test]
    fn test_removed_rules_counted() {
        let previous = vec![rule("a", 0.8, 100), rule("b", 0.9, 50)];
        let current = vec![rule("a", 0.8, 100)];
        let info = compare(&previous, &current, 0.02);
        assert_eq!(info.removed_rules, 1);
        assert_eq!(info.change_rate, 0.5);
        assert!(!info.has_converged);
    }

    #[test]
    fn test_small_churn_in_large_set_converges() {
        let previous: Vec<_> = (0..100).map(|i| rule(&format!("c{i}"), 0.8, 10)).collect();
        let mut current = previous.clone();
        current.push(rule("brand-new", 0.7, 5));
        // 1 change over 100 previous rules = 0.01 <= 0.02.
        let info = compare(&previous, &current, 0.02);
        assert_eq!(info.new_rules, 1);
        assert!(info.has_converged);
    }
}
