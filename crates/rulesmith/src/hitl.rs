//! Human-in-the-loop decision flow.
//!
//! Rules that cannot be auto-resolved become structured questions. A
//! `DecisionProvider` renders them (terminal prompt, GUI dialog, test stub)
//! and returns an answer; the resolution loop records every decision in the
//! workflow's audit log, including skip-HITL auto-approvals.

use crate::error::Result;
use crate::types::{
    HitlAnswer, HitlDecision, HitlOption, HitlQuestion, PreprocessingRule,
    QuestionPriority, QuestionType, RuleType, WorkflowState,
};
use tracing::{info, warn};

/// Renders one question and returns the reviewer's answer.
///
/// Returning `Err(DiscoveryError::Cancelled)` stops resolution cleanly;
/// already-recorded decisions stay in the log.
pub trait DecisionProvider: Send + Sync {
    fn decide(&self, question: &HitlQuestion) -> Result<HitlAnswer>;
}

/// Attribution recorded when `skip_hitl` bypasses review.
pub const SKIP_HITL_ATTRIBUTION: &str = "auto-approved (HITL skipped)";

/// Option keys that mean "take no action"; selecting one leaves the rule
/// unapproved.
const KEEP_KEYS: [&str; 4] = ["keep-as-is", "keep-mixed", "keep-separate", "no"];

fn options_for(rule: &PreprocessingRule) -> (QuestionType, Vec<HitlOption>) {
    match rule.rule_type {
        RuleType::MissingValueStrategy => (
            QuestionType::MultipleChoice,
            vec![
                HitlOption::new("fill-mean", "Fill with mean", "Replace missing values with the column mean"),
                HitlOption::new("fill-median", "Fill with median", "Replace missing values with the column median"),
                HitlOption::new("fill-mode", "Fill with mode", "Replace missing values with the most frequent value"),
                HitlOption::new("fill-constant", "Fill with constant", "Replace missing values with a fixed value"),
                HitlOption::new("drop-rows", "Drop rows", "Remove rows with missing values"),
                HitlOption::new("keep-as-is", "Keep as-is", "Leave missing values untouched"),
            ],
        ),
        RuleType::OutlierHandling => (
            QuestionType::MultipleChoice,
            vec![
                HitlOption::new("remove", "Remove", "Drop rows containing outlier values"),
                HitlOption::new("cap", "Cap", "Clamp outliers to the distribution bounds"),
                HitlOption::new("transform", "Transform", "Apply a log or similar transform"),
                HitlOption::new("keep-as-is", "Keep as-is", "Leave outliers untouched"),
            ],
        ),
        RuleType::TypeConversion => (
            QuestionType::MultipleChoice,
            vec![
                HitlOption::new("to-numeric", "Convert to numeric", "Coerce values to numbers, invalid entries become null"),
                HitlOption::new("to-text", "Convert to text", "Treat every value as a string"),
                HitlOption::new("split-column", "Split column", "Separate numeric and text values into two columns"),
                HitlOption::new("keep-mixed", "Keep mixed", "Leave the column as it is"),
            ],
        ),
        RuleType::CategoryMapping => (
            QuestionType::MultipleChoice,
            vec![
                HitlOption::new("merge-variants", "Merge variants", "Collapse case and whitespace variants into one level"),
                HitlOption::new("keep-separate", "Keep separate", "Treat each spelling as its own level"),
                HitlOption::new("map-to-unknown", "Map to unknown", "Replace variant spellings with an 'unknown' level"),
            ],
        ),
        RuleType::DuplicateHandling => (
            QuestionType::YesNo,
            vec![
                HitlOption::new("yes", "Yes", "Remove duplicate rows"),
                HitlOption::new("no", "No", "Keep duplicate rows"),
            ],
        ),
        // Business logic and any auto-resolvable type that somehow reaches
        // review get a plain confirmation.
        _ => (
            QuestionType::Confirmation,
            vec![
                HitlOption::new("confirm", "Confirm", "Apply the suggested transformation"),
                HitlOption::new("keep-as-is", "Keep as-is", "Skip this transformation"),
            ],
        ),
    }
}

fn recommendation(rule: &PreprocessingRule) -> Option<(String, String)> {
    match rule.rule_type {
        RuleType::MissingValueStrategy if rule.affected_percentage <= 0.10 => Some((
            "fill-median".to_string(),
            "small missing share; median imputation keeps every row".to_string(),
        )),
        RuleType::MissingValueStrategy => Some((
            "drop-rows".to_string(),
            "large missing share; imputation would dominate the column".to_string(),
        )),
        RuleType::OutlierHandling => Some((
            "cap".to_string(),
            "capping keeps the rows while limiting the outliers' influence".to_string(),
        )),
        RuleType::TypeConversion => {
            // The detector records which side holds the majority.
            if rule.transformation.contains("majority of values are numeric") {
                Some((
                    "to-numeric".to_string(),
                    "most values already parse as numbers".to_string(),
                ))
            } else if rule.transformation.contains("majority of values are text") {
                Some((
                    "to-text".to_string(),
                    "most values are text".to_string(),
                ))
            } else {
                None
            }
        }
        RuleType::CategoryMapping => Some((
            "merge-variants".to_string(),
            "variants differ only by case or whitespace".to_string(),
        )),
        _ => None,
    }
}

/// Build the review question for a rule that requires HITL.
pub fn build_question(rule: &PreprocessingRule) -> HitlQuestion {
    let (question_type, options) = options_for(rule);
    let (recommended, recommendation_reason) = match recommendation(rule) {
        Some((key, reason)) => (Some(key), Some(reason)),
        None => (None, None),
    };

    let context = format!(
        "Column(s): {}. {} row(s) affected ({:.1}%). Examples: {}",
        rule.column_names.join(", "),
        rule.affected_rows,
        rule.affected_percentage * 100.0,
        if rule.examples.is_empty() {
            "none".to_string()
        } else {
            rule.examples.join(", ")
        }
    );

    HitlQuestion {
        id: format!("q::{}", rule.id),
        rule_id: rule.id.clone(),
        context,
        question: format!("How should '{}' be handled?", rule.transformation),
        question_type,
        options,
        recommended,
        recommendation_reason,
        priority: if rule.affected_percentage > 0.10 {
            QuestionPriority::High
        } else {
            QuestionPriority::Normal
        },
    }
}

fn selection_approves(selected: &str) -> bool {
    !KEEP_KEYS.contains(&selected)
}

/// Resolve every pending rule through the provider, recording each decision.
///
/// Questions are asked in priority order (high first). A `Cancelled` error
/// from the provider propagates after the decisions so far have been logged,
/// leaving the state consistent and checkpointable.
pub fn resolve_pending(
    state: &mut WorkflowState,
    provider: &dyn DecisionProvider,
) -> Result<usize> {
    let mut pending: Vec<String> = state.pending_rules().map(|r| r.id.clone()).collect();
    // Highest priority first; ties broken by id for determinism.
    pending.sort_by(|a, b| {
        let pa = state.discovered_rules.iter().find(|r| &r.id == a).map(|r| r.priority);
        let pb = state.discovered_rules.iter().find(|r| &r.id == b).map(|r| r.priority);
        pb.cmp(&pa).then(a.cmp(b))
    });

    let mut resolved = 0;
    for rule_id in pending {
        let Some(idx) = state.discovered_rules.iter().position(|r| r.id == rule_id)
        else {
            continue;
        };
        let question = build_question(&state.discovered_rules[idx]);
        let answer = match provider.decide(&question) {
            Ok(answer) => answer,
            Err(err) if err.is_cancelled() => {
                warn!(rule_id = %rule_id, "review cancelled, remaining rules left pending");
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let approved = selection_approves(&answer.selected);
        let rule = &mut state.discovered_rules[idx];
        if approved {
            rule.approve(answer.decided_by.clone());
            if let Some(option) = question.options.iter().find(|o| o.key == answer.selected)
            {
                rule.transformation = format!("{}: {}", option.label, option.description);
            }
        }
        info!(
            rule_id = %rule.id,
            selected = %answer.selected,
            approved,
            "review decision recorded"
        );
        state.decision_log.push(HitlDecision {
            question_id: question.id,
            rule_id: rule.id.clone(),
            selected: answer.selected,
            approved,
            decided_by: answer.decided_by,
        });
        resolved += 1;
    }
    Ok(resolved)
}

/// Approve every pending rule without review, with explicit attribution in
/// the decision log.
pub fn skip_pending(state: &mut WorkflowState) -> usize {
    let pending: Vec<String> = state.pending_rules().map(|r| r.id.clone()).collect();
    for rule_id in &pending {
        if let Some(rule) = state.discovered_rules.iter_mut().find(|r| &r.id == rule_id) {
            rule.approve(SKIP_HITL_ATTRIBUTION);
            state.decision_log.push(HitlDecision {
                question_id: format!("q::{}", rule.id),
                rule_id: rule.id.clone(),
                selected: "auto".to_string(),
                approved: true,
                decided_by: SKIP_HITL_ATTRIBUTION.to_string(),
            });
        }
    }
    if !pending.is_empty() {
        info!(count = pending.len(), "pending rules auto-approved, review skipped");
    }
    pending.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkflowConfig;
    use crate::error::DiscoveryError;
    use crate::types::{PatternType, Severity};
    use std::sync::Mutex;

    fn review_rule(column: &str, rule_type: RuleType, affected_percentage: f64) -> PreprocessingRule {
        let column_names = vec![column.to_string()];
        let pattern_type = PatternType::MissingValues;
        let id = PreprocessingRule::compute_signature(rule_type, &column_names, pattern_type);
        PreprocessingRule {
            id,
            rule_type,
            column_names,
            pattern_type,
            transformation: "fill missing values".to_string(),
            confidence: 0.7,
            affected_rows: 10,
            affected_percentage,
            severity: Severity::Medium,
            priority: 7,
            requires_hitl: true,
            is_approved: false,
            approved_by: None,
            discovered_in_stage: 1,
            examples: vec!["NA".to_string()],
        }
    }

    fn state_with(rules: Vec<PreprocessingRule>) -> WorkflowState {
        let mut state = WorkflowState::new("s1", "data.csv", 100, WorkflowConfig::default());
        state.discovered_rules = rules;
        state
    }

    /// Provider that always picks a fixed option key.
    struct FixedProvider(&'static str);

    impl DecisionProvider for FixedProvider {
        fn decide(&self, _question: &HitlQuestion) -> Result<HitlAnswer> {
            Ok(HitlAnswer {
                selected: self.0.to_string(),
                decided_by: "tester".to_string(),
            })
        }
    }

    /// Provider that answers a limited number of questions then cancels.
    struct CancellingProvider {
        remaining: Mutex<usize>,
    }

    impl DecisionProvider for CancellingProvider {
        fn decide(&self, _question: &HitlQuestion) -> Result<HitlAnswer> {
            let mut remaining = self.remaining.lock().unwrap();
            if *remaining == 0 {
                return Err(DiscoveryError::Cancelled);
            }
            *remaining -= 1;
            Ok(HitlAnswer {
                selected: "fill-median".to_string(),
                decided_by: "tester".to_string(),
            })
        }
    }

    #[test]
    fn test_question_templates() {
        let q = build_question(&review_rule("age", RuleType::MissingValueStrategy, 0.05));
        assert_eq!(q.question_type, QuestionType::MultipleChoice);
        assert_eq!(q.options.len(), 6);
        assert_eq!(q.recommended.as_deref(), Some("fill-median"));
        assert_eq!(q.priority, QuestionPriority::Normal);

        let q = build_question(&review_rule("price", RuleType::OutlierHandling, 0.2));
        assert_eq!(q.options.len(), 4);
        assert_eq!(q.recommended.as_deref(), Some("cap"));
        assert_eq!(q.priority, QuestionPriority::High);

        let q = build_question(&review_rule("dup", RuleType::DuplicateHandling, 0.02));
        assert_eq!(q.question_type, QuestionType::YesNo);

        let q = build_question(&review_rule("biz", RuleType::BusinessLogicDecision, 0.02));
        assert_eq!(q.question_type, QuestionType::Confirmation);
        assert!(q.recommended.is_none());
    }

    #[test]
    fn test_type_conversion_recommendation_from_majority() {
        let mut rule = review_rule("mixed", RuleType::TypeConversion, 0.05);
        rule.transformation = "convert to numeric (majority of values are numeric)".to_string();
        let q = build_question(&rule);
        assert_eq!(q.recommended.as_deref(), Some("to-numeric"));

        rule.transformation = "convert to text (majority of values are text)".to_string();
        let q = build_question(&rule);
        assert_eq!(q.recommended.as_deref(), Some("to-text"));
    }

    #[test]
    fn test_resolve_approves_action_selection() {
        let mut state = state_with(vec![review_rule("age", RuleType::MissingValueStrategy, 0.05)]);
        let resolved = resolve_pending(&mut state, &FixedProvider("fill-median")).unwrap();
        assert_eq!(resolved, 1);
        let rule = &state.discovered_rules[0];
        assert!(rule.is_approved);
        assert_eq!(rule.approved_by.as_deref(), Some("tester"));
        assert!(rule.transformation.starts_with("Fill with median"));
        assert_eq!(state.decision_log.len(), 1);
        assert!(state.decision_log[0].approved);
    }

    #[test]
    fn test_resolve_keep_as_is_leaves_unapproved() {
        let mut state = state_with(vec![review_rule("age", RuleType::MissingValueStrategy, 0.05)]);
        resolve_pending(&mut state, &FixedProvider("keep-as-is")).unwrap();
        assert!(!state.discovered_rules[0].is_approved);
        // The declined decision is still audited.
        assert_eq!(state.decision_log.len(), 1);
        assert!(!state.decision_log[0].approved);
    }

    #[test]
    fn test_cancel_preserves_partial_progress() {
        let mut rules = vec![
            review_rule("a", RuleType::MissingValueStrategy, 0.05),
            review_rule("b", RuleType::MissingValueStrategy, 0.05),
            review_rule("c", RuleType::MissingValueStrategy, 0.05),
        ];
        rules[0].priority = 9;
        rules[1].priority = 5;
        rules[2].priority = 3;
        let mut state = state_with(rules);

        let provider = CancellingProvider {
            remaining: Mutex::new(1),
        };
        let err = resolve_pending(&mut state, &provider).unwrap_err();
        assert!(err.is_cancelled());
        // The highest-priority rule was decided before the cancel.
        assert_eq!(state.decision_log.len(), 1);
        assert_eq!(state.pending_rules().count(), 2);
    }

    #[test]
    fn test_skip_pending_attribution() {
        let mut state = state_with(vec![
            review_rule("a", RuleType::MissingValueStrategy, 0.05),
            review_rule("b", RuleType::OutlierHandling, 0.05),
        ]);
        let skipped = skip_pending(&mut state);
        assert_eq!(skipped, 2);
        assert_eq!(state.pending_rules().count(), 0);
        for rule in &state.discovered_rules {
            assert_eq!(rule.approved_by.as_deref(), Some(SKIP_HITL_ATTRIBUTION));
        }
        assert_eq!(state.decision_log.len(), 2);
        assert!(state
            .decision_log
            .iter()
            .all(|d| d.decided_by == SKIP_HITL_ATTRIBUTION));
    }
}
