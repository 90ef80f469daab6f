//! Core data model for the discovery workflow.
//!
//! Everything durable in the workflow lives here: detected patterns, the
//! preprocessing rules distilled from them, confidence and convergence
//! records, HITL questions/decisions, and the workflow state aggregate that
//! gets checkpointed between stages.

use crate::confidence::ConfidenceCalculator;
use crate::config::WorkflowConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum number of literal example values carried by a pattern or rule.
pub const MAX_EXAMPLES: usize = 5;

/// The kind of data-quality pattern a detector can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    MissingValues,
    WhitespaceIssues,
    TypeInconsistency,
    DateFormatVariation,
    Outliers,
    CategoryVariation,
    EncodingAnomaly,
}

impl PatternType {
    /// Human-readable display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MissingValues => "Missing Values",
            Self::WhitespaceIssues => "Whitespace Issues",
            Self::TypeInconsistency => "Type Inconsistency",
            Self::DateFormatVariation => "Date Format Variation",
            Self::Outliers => "Outliers",
            Self::CategoryVariation => "Category Variation",
            Self::EncodingAnomaly => "Encoding Anomaly",
        }
    }
}

/// Severity of a detected pattern, ordered from least to most serious.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Base priority contribution for rules of this severity.
    pub fn base_priority(&self) -> u8 {
        match self {
            Self::Critical => 10,
            Self::High => 7,
            Self::Medium => 5,
            Self::Low => 3,
            Self::Info => 1,
        }
    }
}

/// The kind of preprocessing rule discovered from detected patterns.
///
/// The first five variants are auto-resolvable (the transformation is
/// unambiguous and safe); the rest require human review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    DateFormatStandardization,
    EncodingNormalization,
    WhitespaceNormalization,
    CaseNormalization,
    NumericFormatStandardization,
    MissingValueStrategy,
    OutlierHandling,
    CategoryMapping,
    TypeConversion,
    DuplicateHandling,
    BusinessLogicDecision,
}

impl RuleType {
    /// Whether rules of this type may be applied without human confirmation.
    pub fn auto_resolvable(&self) -> bool {
        matches!(
            self,
            Self::DateFormatStandardization
                | Self::EncodingNormalization
                | Self::WhitespaceNormalization
                | Self::CaseNormalization
                | Self::NumericFormatStandardization
        )
    }

    /// Priority bonus applied on top of the severity base.
    pub fn priority_bonus(&self) -> u8 {
        match self {
            Self::MissingValueStrategy | Self::TypeConversion => 2,
            Self::OutlierHandling | Self::EncodingNormalization => 1,
            _ => 0,
        }
    }

    /// Stable snake_case token used inside rule ids and signatures.
    pub fn token(&self) -> &'static str {
        match self {
            Self::DateFormatStandardization => "date_format_standardization",
            Self::EncodingNormalization => "encoding_normalization",
            Self::WhitespaceNormalization => "whitespace_normalization",
            Self::CaseNormalization => "case_normalization",
            Self::NumericFormatStandardization => "numeric_format_standardization",
            Self::MissingValueStrategy => "missing_value_strategy",
            Self::OutlierHandling => "outlier_handling",
            Self::CategoryMapping => "category_mapping",
            Self::TypeConversion => "type_conversion",
            Self::DuplicateHandling => "duplicate_handling",
            Self::BusinessLogicDecision => "business_logic_decision",
        }
    }
}

/// Ephemeral output of one detector run on one column.
///
/// Created fresh every stage and converted into rules by the discovery
/// engine; never persisted standalone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub pattern_type: PatternType,
    pub column_name: String,
    pub description: String,
    /// Detector confidence in [0, 1].
    pub confidence: f64,
    pub severity: Severity,
    /// Count of offending values.
    pub occurrences: usize,
    /// Share of rows affected, in [0, 1].
    pub affected_percentage: f64,
    /// Free-text description of the suggested fix.
    pub suggested_fix: String,
    /// Bounded list of literal offending values.
    pub examples: Vec<String>,
}

/// A durable preprocessing rule discovered from one or more patterns.
///
/// The tuple (rule_type, column_names, pattern_type) forms the rule's
/// signature, which uniquely identifies it across stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingRule {
    /// Stable signature-derived identifier.
    pub id: String,
    pub rule_type: RuleType,
    pub column_names: Vec<String>,
    pub pattern_type: PatternType,
    /// Description of the transformation to apply.
    pub transformation: String,
    /// Rule confidence in [0, 1]; always clamped on update.
    pub confidence: f64,
    pub affected_rows: usize,
    /// Share of rows affected, in [0, 1].
    pub affected_percentage: f64,
    pub severity: Severity,
    /// Priority in [1, 10]; higher runs first.
    pub priority: u8,
    pub requires_hitl: bool,
    pub is_approved: bool,
    pub approved_by: Option<String>,
    /// Workflow stage (1-5) in which this rule was first discovered.
    pub discovered_in_stage: u8,
    pub examples: Vec<String>,
}

impl PreprocessingRule {
    /// Compute the signature for a (rule type, columns, pattern type) tuple.
    ///
    /// Column names are sorted so the signature does not depend on
    /// discovery order.
    pub fn compute_signature(
        rule_type: RuleType,
        column_names: &[String],
        pattern_type: PatternType,
    ) -> String {
        let mut columns = column_names.to_vec();
        columns.sort();
        format!(
            "{}|{}|{}",
            rule_type.token(),
            columns.join(","),
            serde_json::to_value(pattern_type)
                .ok()
                .and_then(|v| v.as_str().map(str::to_owned))
                .unwrap_or_default()
        )
    }

    /// The signature identifying this rule across stages.
    pub fn signature(&self) -> String {
        Self::compute_signature(self.rule_type, &self.column_names, self.pattern_type)
    }

    /// Update the confidence, clamping to [0, 1].
    pub fn set_confidence(&mut self, confidence: f64) {
        self.confidence = confidence.clamp(0.0, 1.0);
    }

    /// Mark the rule approved, recording who approved it.
    pub fn approve(&mut self, approved_by: impl Into<String>) {
        self.is_approved = true;
        self.approved_by = Some(approved_by.into());
    }
}

/// Per-rule, per-evaluation confidence breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScore {
    /// Successful applications / applicable rows.
    pub consistency: f64,
    /// Applicable rows / total rows.
    pub coverage: f64,
    /// 1 - |ratio at stage N - ratio at stage N-1|.
    pub stability: f64,
    /// 0.5 * consistency + 0.3 * coverage + 0.2 * stability.
    pub overall: f64,
}

/// Comparison between the rule sets of two consecutive stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceInfo {
    pub new_rules: usize,
    pub modified_rules: usize,
    pub removed_rules: usize,
    pub stable_rules: usize,
    /// (new + modified + removed) / max(previous count, 1).
    pub change_rate: f64,
    /// Always false when there was no previous stage.
    pub has_converged: bool,
}

/// Immutable record of one stage's execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: WorkflowStage,
    pub sample_size: usize,
    pub sample_ratio: f64,
    /// Signatures of rules first discovered in this stage.
    pub new_rule_signatures: Vec<String>,
    /// Per-rule confidence breakdown against this stage's sample, keyed by
    /// rule signature.
    pub rule_scores: BTreeMap<String, ConfidenceScore>,
    pub duration_ms: u64,
    pub notes: Vec<String>,
}

/// The type of answer a HITL question expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    YesNo,
    NumericInput,
    TextInput,
    Confirmation,
}

/// Priority of a HITL question, derived from the underlying rule's impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionPriority {
    Low,
    Normal,
    High,
}

/// One selectable option on a HITL question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitlOption {
    pub key: String,
    pub label: String,
    pub description: String,
}

impl HitlOption {
    pub fn new(
        key: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            description: description.into(),
        }
    }
}

/// A structured decision request for a rule that requires human review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitlQuestion {
    pub id: String,
    /// Id of the rule this question resolves.
    pub rule_id: String,
    /// Context shown before the question (column names, impact, examples).
    pub context: String,
    pub question: String,
    pub question_type: QuestionType,
    pub options: Vec<HitlOption>,
    /// Key of the system-recommended option, when one can be derived.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_reason: Option<String>,
    pub priority: QuestionPriority,
}

/// The structured answer the decision provider returns for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitlAnswer {
    /// Key of the selected option (or free-form input for text/numeric).
    pub selected: String,
    /// Who answered (reviewer name or system attribution).
    pub decided_by: String,
}

/// Binds one question to its answer and the resulting approval action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitlDecision {
    pub question_id: String,
    pub rule_id: String,
    pub selected: String,
    pub approved: bool,
    pub decided_by: String,
}

/// The five sequential stages of the workflow plus the terminal state.
///
/// Strictly sequential; no re-entry except via explicit checkpoint resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    InitialExploration,
    PatternExpansion,
    HitlDecision,
    ConfidenceCheckpoint,
    BulkProcessing,
    Completed,
}

impl WorkflowStage {
    /// Stage number in [1, 5]; `Completed` reports 5.
    pub fn number(&self) -> u8 {
        match self {
            Self::InitialExploration => 1,
            Self::PatternExpansion => 2,
            Self::HitlDecision => 3,
            Self::ConfidenceCheckpoint => 4,
            Self::BulkProcessing | Self::Completed => 5,
        }
    }

    /// The stage that follows this one.
    pub fn next(&self) -> Self {
        match self {
            Self::InitialExploration => Self::PatternExpansion,
            Self::PatternExpansion => Self::HitlDecision,
            Self::HitlDecision => Self::ConfidenceCheckpoint,
            Self::ConfidenceCheckpoint => Self::BulkProcessing,
            Self::BulkProcessing | Self::Completed => Self::Completed,
        }
    }

    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::InitialExploration => "Initial Exploration",
            Self::PatternExpansion => "Pattern Expansion",
            Self::HitlDecision => "HITL Decision",
            Self::ConfidenceCheckpoint => "Confidence Checkpoint",
            Self::BulkProcessing => "Bulk Processing",
            Self::Completed => "Completed",
        }
    }
}

/// The single mutable aggregate owned by the orchestrator.
///
/// Created once at workflow start, mutated by each stage, and serialized to
/// a checkpoint after every stage when checkpointing is enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub session_id: String,
    pub current_stage: WorkflowStage,
    pub dataset_path: String,
    pub total_records: usize,
    /// Completed stage results keyed by stage number for deterministic JSON.
    pub completed_stages: BTreeMap<u8, StageResult>,
    pub discovered_rules: Vec<PreprocessingRule>,
    pub approved_rules: Vec<PreprocessingRule>,
    /// Composite confidence computed at the checkpoint stage.
    pub confidence_score: f64,
    pub has_converged: bool,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub config: WorkflowConfig,
    /// Audit trail of HITL decisions, including skip-HITL auto-approvals.
    pub decision_log: Vec<HitlDecision>,
    /// Confidence histories and the global convergence counter. Checkpointed
    /// with the rest of the state so resumed runs keep their trajectory.
    pub confidence_tracker: ConfidenceCalculator,
}

impl WorkflowState {
    /// Create a fresh workflow state at the first stage.
    pub fn new(session_id: impl Into<String>, dataset_path: impl Into<String>, total_records: usize, config: WorkflowConfig) -> Self {
        let confidence_tracker = ConfidenceCalculator::new(&config);
        Self {
            session_id: session_id.into(),
            current_stage: WorkflowStage::InitialExploration,
            dataset_path: dataset_path.into(),
            total_records,
            completed_stages: BTreeMap::new(),
            discovered_rules: Vec::new(),
            approved_rules: Vec::new(),
            confidence_score: 0.0,
            has_converged: false,
            started_at: Utc::now(),
            completed_at: None,
            config,
            decision_log: Vec::new(),
            confidence_tracker,
        }
    }

    /// Rules that still need review and have not been approved.
    pub fn pending_rules(&self) -> impl Iterator<Item = &PreprocessingRule> {
        self.discovered_rules
            .iter()
            .filter(|r| r.requires_hitl && !r.is_approved)
    }

    /// Share of discovered rules that are approved; 1.0 when none exist.
    pub fn approval_ratio(&self) -> f64 {
        if self.discovered_rules.is_empty() {
            1.0
        } else {
            let approved = self
                .discovered_rules
                .iter()
                .filter(|r| r.is_approved)
                .count();
            approved as f64 / self.discovered_rules.len() as f64
        }
    }
}
