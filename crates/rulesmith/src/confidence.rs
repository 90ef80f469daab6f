//! Confidence scoring and cross-stage stability tracking.
//!
//! The calculator owns all of its history; nothing here is process-global,
//! so two concurrent workflows never share convergence state.

use crate::config::WorkflowConfig;
use crate::types::ConfidenceScore;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::trace;

/// Observations kept per rule signature.
const HISTORY_LEN: usize = 10;

/// Tracks per-rule confidence histories and the global convergence counter.
///
/// Serialized as part of the workflow state so a resumed run continues the
/// same trajectory instead of starting its histories from scratch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceCalculator {
    histories: HashMap<String, VecDeque<f64>>,
    /// Coverage ratio from each rule's most recent evaluation.
    last_coverage: HashMap<String, f64>,
    samples_since_new_rule: usize,
    stability_threshold: f64,
    max_variance: f64,
    required_stable_samples: usize,
}

impl ConfidenceCalculator {
    pub fn new(config: &WorkflowConfig) -> Self {
        Self {
            histories: HashMap::new(),
            last_coverage: HashMap::new(),
            samples_since_new_rule: 0,
            stability_threshold: config.stability_threshold,
            max_variance: config.max_variance,
            required_stable_samples: config.required_stable_samples,
        }
    }

    /// Score one evaluation of a rule against a sample.
    ///
    /// `consistency` is successes over applicable rows, `coverage` is
    /// applicable rows over total rows, `stability` is one minus the drift
    /// of the applicable ratio since the previous sample. Every term and
    /// the weighted overall are clamped to [0, 1].
    pub fn score(
        &self,
        successes: usize,
        applicable: usize,
        total: usize,
        previous_ratio: Option<f64>,
    ) -> ConfidenceScore {
        let consistency = if applicable == 0 {
            0.0
        } else {
            (successes as f64 / applicable as f64).clamp(0.0, 1.0)
        };
        let coverage = if total == 0 {
            0.0
        } else {
            (applicable as f64 / total as f64).clamp(0.0, 1.0)
        };
        let stability = match previous_ratio {
            Some(prev) => (1.0 - (coverage - prev).abs()).clamp(0.0, 1.0),
            None => 1.0,
        };
        let overall =
            (0.5 * consistency + 0.3 * coverage + 0.2 * stability).clamp(0.0, 1.0);
        ConfidenceScore {
            consistency,
            coverage,
            stability,
            overall,
        }
    }

    /// Score a rule against the current sample, using the rule's previous
    /// coverage ratio for the stability term and remembering the new one
    /// for the next stage.
    pub fn evaluate(
        &mut self,
        signature: &str,
        successes: usize,
        applicable: usize,
        total: usize,
    ) -> ConfidenceScore {
        let previous = self.last_coverage.get(signature).copied();
        let score = self.score(successes, applicable, total, previous);
        self.last_coverage
            .insert(signature.to_string(), score.coverage);
        score
    }

    /// Record a confidence observation for a rule.
    pub fn observe(&mut self, signature: &str, confidence: f64) {
        let history = self.histories.entry(signature.to_string()).or_default();
        if history.len() == HISTORY_LEN {
            history.pop_front();
        }
        history.push_back(confidence.clamp(0.0, 1.0));
        trace!(signature, confidence, len = history.len(), "observed");
    }

    /// Advance the convergence counter by one sample batch. A batch that
    /// discovered any new rule resets the counter.
    pub fn record_sample(&mut self, sample_size: usize, new_rule_count: usize) {
        if new_rule_count > 0 {
            self.samples_since_new_rule = 0;
        } else {
            self.samples_since_new_rule += sample_size;
        }
    }

    /// Exponentially weighted mean of a rule's history, recent samples
    /// weighted most. Returns None for untracked rules.
    pub fn weighted(&self, signature: &str) -> Option<f64> {
        let history = self.histories.get(signature)?;
        if history.is_empty() {
            return None;
        }
        let n = history.len();
        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        for (i, value) in history.iter().enumerate() {
            let weight = ((i as f64) - (n as f64) + 1.0).exp();
            weighted_sum += weight * value;
            weight_sum += weight;
        }
        Some(weighted_sum / weight_sum)
    }

    /// Population variance of a rule's history. None for untracked rules.
    pub fn variance(&self, signature: &str) -> Option<f64> {
        let history = self.histories.get(signature)?;
        if history.is_empty() {
            return None;
        }
        let n = history.len() as f64;
        let mean: f64 = history.iter().sum::<f64>() / n;
        Some(history.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n)
    }

    /// A rule is stable when its weighted confidence is at or above the
    /// stability threshold and its variance at or below the cap.
    pub fn is_stable(&self, signature: &str) -> bool {
        match (self.weighted(signature), self.variance(signature)) {
            (Some(weighted), Some(variance)) => {
                weighted >= self.stability_threshold && variance <= self.max_variance
            }
            _ => false,
        }
    }

    /// Global convergence: enough samples without a new rule AND every
    /// tracked rule stable. False when nothing is tracked yet.
    pub fn has_globally_converged(&self) -> bool {
        !self.histories.is_empty()
            && self.samples_since_new_rule >= self.required_stable_samples
            && self.histories.keys().all(|sig| self.is_stable(sig))
    }

    pub fn samples_since_new_rule(&self) -> usize {
        self.samples_since_new_rule
    }

    pub fn tracked_rules(&self) -> usize {
        self.histories.len()
    }
}
