//! The five-stage discovery workflow orchestrator.
//!
//! Stages run strictly in order: initial exploration, pattern expansion,
//! HITL decision, confidence checkpoint, bulk processing. Each stage samples
//! a growing share of the dataset, feeds the detectors, merges the resulting
//! rules into the accumulated set, and (when enabled) writes a checkpoint.
//! A checkpoint written after stage N can be resumed with stage N+1; the
//! seeded sampling makes the resumed trajectory match the original.

pub mod checkpoint;
pub mod progress;

pub use progress::{
    CancellationToken, ClosureProgressReporter, NoopProgressReporter, ProgressReporter,
    StageProgress,
};

use crate::apply::RuleApplicator;
use crate::config::WorkflowConfig;
use crate::convergence;
use crate::detectors::run_detectors;
use crate::discovery::{RuleDiscoveryEngine, merge_rules};
use crate::error::{DiscoveryError, Result, ResultExt};
use crate::hitl::{self, DecisionProvider};
use crate::sampling::DatasetSource;
use crate::types::{
    HitlAnswer, HitlDecision, HitlQuestion, StageResult, WorkflowStage, WorkflowState,
};
use chrono::Utc;
use polars::prelude::DataFrame;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Attribution for rules approved by the checkpoint stage after the
/// composite confidence cleared the bar.
const CHECKPOINT_ATTRIBUTION: &str = "system (confidence checkpoint)";

/// Builder for [`Workflow`]. Only the dataset source is mandatory.
pub struct WorkflowBuilder {
    config: WorkflowConfig,
    source: Option<Arc<dyn DatasetSource>>,
    decision_provider: Option<Arc<dyn DecisionProvider>>,
    applicator: Option<Arc<dyn RuleApplicator>>,
    reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation: CancellationToken,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self {
            config: WorkflowConfig::default(),
            source: None,
            decision_provider: None,
            applicator: None,
            reporter: None,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    pub fn source(mut self, source: Arc<dyn DatasetSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn decision_provider(mut self, provider: Arc<dyn DecisionProvider>) -> Self {
        self.decision_provider = Some(provider);
        self
    }

    pub fn applicator(mut self, applicator: Arc<dyn RuleApplicator>) -> Self {
        self.applicator = Some(applicator);
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn build(self) -> Result<Workflow> {
        let source = self.source.ok_or_else(|| {
            DiscoveryError::InvalidConfig("a dataset source is required".to_string())
        })?;
        Ok(Workflow {
            config: self.config,
            source,
            decision_provider: self.decision_provider,
            applicator: self.applicator,
            reporter: self
                .reporter
                .unwrap_or_else(|| Arc::new(NoopProgressReporter)),
            cancellation: self.cancellation,
        })
    }
}

impl Default for WorkflowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decision provider wrapper that honors the cancellation token between
/// questions.
struct CancellableProvider<'a> {
    inner: &'a dyn DecisionProvider,
    token: &'a CancellationToken,
}

impl DecisionProvider for CancellableProvider<'_> {
    fn decide(&self, question: &HitlQuestion) -> Result<HitlAnswer> {
        if self.token.is_cancelled() {
            return Err(DiscoveryError::Cancelled);
        }
        self.inner.decide(question)
    }
}

/// The workflow orchestrator. Everything durable, including the confidence
/// tracker, lives in the [`WorkflowState`] it returns.
pub struct Workflow {
    config: WorkflowConfig,
    source: Arc<dyn DatasetSource>,
    decision_provider: Option<Arc<dyn DecisionProvider>>,
    applicator: Option<Arc<dyn RuleApplicator>>,
    reporter: Arc<dyn ProgressReporter>,
    cancellation: CancellationToken,
}

impl Workflow {
    pub fn builder() -> WorkflowBuilder {
        WorkflowBuilder::new()
    }

    /// Run all five stages from scratch.
    pub fn run(&mut self) -> Result<WorkflowState> {
        let session_id = format!("wf-{}", Utc::now().format("%Y%m%d%H%M%S"));
        let state = WorkflowState::new(
            session_id,
            self.source.path(),
            self.source.row_count(),
            self.config.clone(),
        );
        info!(
            session_id = %state.session_id,
            rows = state.total_records,
            "workflow started"
        );
        self.run_from(state)
    }

    /// Resume from a checkpoint file. The checkpointed config (including the
    /// seed) replaces the builder's, and the confidence tracker rides along
    /// inside the state, so the trajectory is reproduced.
    pub fn resume(&mut self, checkpoint_path: &Path) -> Result<WorkflowState> {
        let mut state = checkpoint::load(checkpoint_path)?;
        self.config = state.config.clone();
        // The checkpoint was written after its stage completed.
        if state
            .completed_stages
            .contains_key(&state.current_stage.number())
            && state.current_stage != WorkflowStage::Completed
        {
            state.current_stage = state.current_stage.next();
        }
        info!(
            session_id = %state.session_id,
            stage = state.current_stage.number(),
            "workflow resumed"
        );
        self.run_from(state)
    }

    fn run_from(&mut self, mut state: WorkflowState) -> Result<WorkflowState> {
        while state.current_stage != WorkflowStage::Completed {
            if self.cancellation.is_cancelled() {
                warn!(stage = state.current_stage.number(), "workflow cancelled");
                return Err(DiscoveryError::Cancelled);
            }

            let stage = state.current_stage;
            let started = Instant::now();
            let mut result = match stage {
                WorkflowStage::InitialExploration => self.explore(&mut state)?,
                WorkflowStage::PatternExpansion => self.expand(&mut state)?,
                WorkflowStage::HitlDecision => self.decide(&mut state)?,
                WorkflowStage::ConfidenceCheckpoint => self.checkpoint_stage(&mut state)?,
                WorkflowStage::BulkProcessing => self.bulk_process(&mut state)?,
                WorkflowStage::Completed => unreachable!(),
            };
            result.duration_ms = started.elapsed().as_millis() as u64;

            info!(
                stage = stage.number(),
                name = stage.display_name(),
                sample_size = result.sample_size,
                new_rules = result.new_rule_signatures.len(),
                duration_ms = result.duration_ms,
                "stage complete"
            );
            state.completed_stages.insert(stage.number(), result);

            if self.config.enable_checkpointing {
                checkpoint::save(&state, Path::new(&self.config.checkpoint_dir))
                    .context("writing the stage checkpoint")?;
            }

            self.reporter.report(&StageProgress {
                stage,
                progress: stage.number() as f64 / 5.0,
                message: format!("{} complete", stage.display_name()),
                rules_discovered: state.discovered_rules.len(),
                confidence: state.confidence_score,
                converged: state.has_converged,
            });

            state.current_stage = stage.next();
        }

        state.completed_at = Some(Utc::now());
        info!(
            session_id = %state.session_id,
            rules = state.discovered_rules.len(),
            approved = state.approved_rules.len(),
            converged = state.has_converged,
            "workflow complete"
        );
        Ok(state)
    }

    /// Sample for the given stage, run the detectors, and merge the
    /// discovered rules into the state. Returns the stage result skeleton
    /// and the sampled frame for handlers that need it.
    fn discover_on_sample(
        &mut self,
        state: &mut WorkflowState,
        stage: WorkflowStage,
    ) -> Result<(StageResult, DataFrame)> {
        let ratio = self.config.stage_ratios[(stage.number() - 1) as usize];
        let seed = self.config.seed.wrapping_add(stage.number() as u64);
        let sample = self.source.sample(ratio, seed)?;

        let outcome = run_detectors(&sample, &self.config);
        let engine = RuleDiscoveryEngine::new(&self.config);
        let discovered = engine.discover(&outcome.patterns, stage.number());
        let new_signatures = merge_rules(&mut state.discovered_rules, discovered);

        let mut rule_scores = BTreeMap::new();
        for rule in &state.discovered_rules {
            let signature = rule.signature();
            // Rows the rule's transformation is expected to fix, out of the
            // rows it applies to.
            let successes = (rule.affected_rows as f64 * rule.confidence).round() as usize;
            let score = state.confidence_tracker.evaluate(
                &signature,
                successes,
                rule.affected_rows,
                sample.height(),
            );
            state.confidence_tracker.observe(&signature, rule.confidence);
            rule_scores.insert(signature, score);
        }
        state
            .confidence_tracker
            .record_sample(sample.height(), new_signatures.len());

        Ok((
            StageResult {
                stage,
                sample_size: sample.height(),
                sample_ratio: ratio,
                new_rule_signatures: new_signatures,
                rule_scores,
                duration_ms: 0,
                notes: outcome.failures,
            },
            sample,
        ))
    }

    fn explore(&mut self, state: &mut WorkflowState) -> Result<StageResult> {
        let (result, _) =
            self.discover_on_sample(state, WorkflowStage::InitialExploration)?;
        Ok(result)
    }

    fn expand(&mut self, state: &mut WorkflowState) -> Result<StageResult> {
        let baseline = state.discovered_rules.clone();
        let (mut result, _) =
            self.discover_on_sample(state, WorkflowStage::PatternExpansion)?;

        let info = convergence::compare(
            &baseline,
            &state.discovered_rules,
            self.config.convergence_threshold,
        );
        state.has_converged = result.new_rule_signatures.is_empty() || info.has_converged;
        result.notes.push(format!(
            "change rate {:.3} ({} new, {} modified, {} removed)",
            info.change_rate, info.new_rules, info.modified_rules, info.removed_rules
        ));
        Ok(result)
    }

    fn decide(&mut self, state: &mut WorkflowState) -> Result<StageResult> {
        let (mut result, _) =
            self.discover_on_sample(state, WorkflowStage::HitlDecision)?;

        let pending = state.pending_rules().count();
        if pending == 0 {
            result.notes.push("no rules required review".to_string());
            return Ok(result);
        }

        if self.config.skip_hitl {
            let approved = hitl::skip_pending(state);
            result
                .notes
                .push(format!("review skipped, {approved} rule(s) auto-approved"));
            return Ok(result);
        }

        match &self.decision_provider {
            Some(provider) => {
                let wrapped = CancellableProvider {
                    inner: provider.as_ref(),
                    token: &self.cancellation,
                };
                let resolved = hitl::resolve_pending(state, &wrapped)?;
                result
                    .notes
                    .push(format!("{resolved} rule(s) resolved through review"));
                Ok(result)
            }
            None => Err(DiscoveryError::NoDecisionProvider),
        }
    }

    fn checkpoint_stage(&mut self, state: &mut WorkflowState) -> Result<StageResult> {
        let baseline = state.discovered_rules.clone();
        let (mut result, sample) =
            self.discover_on_sample(state, WorkflowStage::ConfidenceCheckpoint)?;

        let info = convergence::compare(
            &baseline,
            &state.discovered_rules,
            self.config.convergence_threshold,
        );
        if info.has_converged || result.new_rule_signatures.is_empty() {
            state.has_converged = true;
        }
        if state.confidence_tracker.has_globally_converged() {
            state.has_converged = true;
            result.notes.push(format!(
                "globally converged: {} sample(s) without a new rule, all {} rule(s) stable",
                state.confidence_tracker.samples_since_new_rule(),
                state.confidence_tracker.tracked_rules()
            ));
        }

        let convergence_factor = (1.0 - info.change_rate).clamp(0.0, 1.0);
        let sample_quality = non_null_ratio(&sample);
        let composite = 0.4 * convergence_factor
            + 0.3 * sample_quality
            + 0.3 * state.approval_ratio();
        state.confidence_score = composite;
        result.notes.push(format!(
            "composite confidence {composite:.3} (convergence {convergence_factor:.3}, sample quality {sample_quality:.3}, approval {:.3})",
            state.approval_ratio()
        ));

        if composite >= self.config.min_composite_confidence
            && self.config.enable_auto_approval
        {
            let pending: Vec<String> =
                state.pending_rules().map(|r| r.id.clone()).collect();
            for rule_id in &pending {
                if let Some(rule) =
                    state.discovered_rules.iter_mut().find(|r| &r.id == rule_id)
                {
                    rule.approve(CHECKPOINT_ATTRIBUTION);
                    state.decision_log.push(HitlDecision {
                        question_id: format!("q::{rule_id}"),
                        rule_id: rule_id.clone(),
                        selected: "auto".to_string(),
                        approved: true,
                        decided_by: CHECKPOINT_ATTRIBUTION.to_string(),
                    });
                }
            }
            if !pending.is_empty() {
                result.notes.push(format!(
                    "{} remaining rule(s) approved at the confidence checkpoint",
                    pending.len()
                ));
            }
        } else if composite < self.config.min_composite_confidence {
            result.notes.push(format!(
                "composite confidence below {:.2}, pending rules left for review",
                self.config.min_composite_confidence
            ));
        }

        Ok(result)
    }

    fn bulk_process(&mut self, state: &mut WorkflowState) -> Result<StageResult> {
        let full = self.source.full()?;
        let mut result = StageResult {
            stage: WorkflowStage::BulkProcessing,
            sample_size: full.height(),
            sample_ratio: 1.0,
            new_rule_signatures: Vec::new(),
            rule_scores: BTreeMap::new(),
            duration_ms: 0,
            notes: Vec::new(),
        };

        let mut approved: Vec<_> = state
            .discovered_rules
            .iter()
            .filter(|r| r.is_approved)
            .cloned()
            .collect();
        approved.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(b.affected_rows.cmp(&a.affected_rows))
        });

        match &self.applicator {
            Some(applicator) => {
                for rule in &approved {
                    // Rules can outlive their columns when a checkpoint is
                    // resumed against a reshaped dataset.
                    if let Some(missing) = rule
                        .column_names
                        .iter()
                        .find(|name| full.column(name.as_str()).is_err())
                    {
                        let err = DiscoveryError::ColumnNotFound(missing.clone());
                        warn!(rule_id = %rule.id, error = %err, "rule skipped");
                        result
                            .notes
                            .push(format!("rule '{}' skipped: {err}", rule.id));
                        continue;
                    }
                    match applicator.apply(rule, &full) {
                        Ok(outcome) if outcome.success => {
                            result.notes.push(format!(
                                "applied '{}': {} row(s) affected",
                                rule.id, outcome.rows_affected
                            ));
                        }
                        Ok(outcome) => {
                            warn!(rule_id = %rule.id, message = %outcome.message, "rule did not apply");
                            result.notes.push(format!(
                                "rule '{}' did not apply: {}",
                                rule.id, outcome.message
                            ));
                        }
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => {
                            let err = DiscoveryError::RuleApplicationFailed {
                                rule_id: rule.id.clone(),
                                reason: e.to_string(),
                            };
                            warn!(error = %err, "rule application failed");
                            result.notes.push(err.to_string());
                        }
                    }
                }
            }
            None => {
                result
                    .notes
                    .push("no applicator configured; approved rules handed off only".to_string());
            }
        }

        state.approved_rules = approved;
        Ok(result)
    }
}

/// Share of non-null cells in the frame; 1.0 for an empty frame.
fn non_null_ratio(df: &DataFrame) -> f64 {
    let cells = df.height() * df.width();
    if cells == 0 {
        return 1.0;
    }
    let nulls: usize = df.get_columns().iter().map(|c| c.null_count()).sum();
    1.0 - nulls as f64 / cells as f64
}
