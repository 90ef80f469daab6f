//! Rule discovery: turns detected patterns into durable preprocessing rules.
//!
//! Discovery is deterministic. Running it twice over the same patterns
//! yields identical rule signatures, confidences, and ordering.

use crate::config::WorkflowConfig;
use crate::types::{DetectedPattern, PatternType, PreprocessingRule, RuleType};
use tracing::debug;

/// Fixed mapping from the pattern a detector emits to the rule that fixes it.
pub fn rule_type_for(pattern_type: PatternType) -> RuleType {
    match pattern_type {
        PatternType::MissingValues => RuleType::MissingValueStrategy,
        PatternType::WhitespaceIssues => RuleType::WhitespaceNormalization,
        PatternType::TypeInconsistency => RuleType::TypeConversion,
        PatternType::DateFormatVariation => RuleType::DateFormatStandardization,
        PatternType::Outliers => RuleType::OutlierHandling,
        PatternType::CategoryVariation => RuleType::CategoryMapping,
        PatternType::EncodingAnomaly => RuleType::EncodingNormalization,
    }
}

/// Priority from severity base plus the rule type bonus, clamped to [1, 10].
pub fn compute_priority(rule: &PreprocessingRule) -> u8 {
    (rule.severity.base_priority() + rule.rule_type.priority_bonus()).clamp(1, 10)
}

/// Builds preprocessing rules from one stage's detected patterns.
pub struct RuleDiscoveryEngine<'a> {
    config: &'a WorkflowConfig,
}

impl<'a> RuleDiscoveryEngine<'a> {
    pub fn new(config: &'a WorkflowConfig) -> Self {
        Self { config }
    }

    /// Convert patterns into rules, sorted by priority then impact.
    ///
    /// Auto-resolvable rules above the auto-approve threshold come back
    /// already approved by "system" when auto-approval is enabled.
    pub fn discover(
        &self,
        patterns: &[DetectedPattern],
        stage_number: u8,
    ) -> Vec<PreprocessingRule> {
        let mut rules: Vec<PreprocessingRule> = patterns
            .iter()
            .map(|p| self.rule_from_pattern(p, stage_number))
            .collect();

        rules.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(b.affected_rows.cmp(&a.affected_rows))
                .then(a.id.cmp(&b.id))
        });

        debug!(
            rules = rules.len(),
            auto_approved = rules.iter().filter(|r| r.is_approved).count(),
            "rule discovery complete"
        );
        rules
    }

    fn rule_from_pattern(
        &self,
        pattern: &DetectedPattern,
        stage_number: u8,
    ) -> PreprocessingRule {
        let rule_type = rule_type_for(pattern.pattern_type);
        let column_names = vec![pattern.column_name.clone()];
        let id = PreprocessingRule::compute_signature(
            rule_type,
            &column_names,
            pattern.pattern_type,
        );

        let mut rule = PreprocessingRule {
            id,
            rule_type,
            column_names,
            pattern_type: pattern.pattern_type,
            transformation: pattern.suggested_fix.clone(),
            confidence: pattern.confidence.clamp(0.0, 1.0),
            affected_rows: pattern.occurrences,
            affected_percentage: pattern.affected_percentage,
            severity: pattern.severity,
            priority: 0,
            requires_hitl: !rule_type.auto_resolvable(),
            is_approved: false,
            approved_by: None,
            discovered_in_stage: stage_number,
            examples: pattern.examples.clone(),
        };
        rule.priority = compute_priority(&rule);

        if self.config.enable_auto_approval
            && rule_type.auto_resolvable()
            && rule.confidence > self.config.auto_approve_threshold
        {
            rule.approve("system");
        }

        rule
    }
}

/// Merge newly discovered rules into the accumulated set, matching by
/// signature. Existing rules keep their approval state and discovery stage
/// but take the new confidence and impact counts. Returns the signatures of
/// rules seen for the first time.
pub fn merge_rules(
    existing: &mut Vec<PreprocessingRule>,
    incoming: Vec<PreprocessingRule>,
) -> Vec<String> {
    let mut new_signatures = Vec::new();
    for rule in incoming {
        let signature = rule.signature();
        match existing.iter_mut().find(|r| r.signature() == signature) {
            Some(current) => {
                current.set_confidence(rule.confidence);
                current.affected_rows = rule.affected_rows;
                current.affected_percentage = rule.affected_percentage;
                current.severity = rule.severity;
                current.priority = compute_priority(current);
                current.examples = rule.examples;
            }
            None => {
                new_signatures.push(signature);
                existing.push(rule);
            }
        }
    }
    new_signatures
}
