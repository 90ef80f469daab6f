//! Configuration types for the discovery workflow.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic workflow setup. The configuration is embedded
//! in every checkpoint so a resumed workflow runs with the same settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default sample ratios for the five workflow stages, in order:
/// initial exploration, pattern expansion, HITL decision, confidence
/// checkpoint, bulk processing.
pub const DEFAULT_STAGE_RATIOS: [f64; 5] = [0.001, 0.005, 0.015, 0.025, 1.0];

/// Configuration for the rule discovery workflow.
///
/// Use [`WorkflowConfig::builder()`] to create a new configuration with a
/// fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use rulesmith::WorkflowConfig;
///
/// let config = WorkflowConfig::builder()
///     .convergence_threshold(0.05)
///     .skip_hitl(true)
///     .seed(42)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Sample ratios per stage (0.0 - 1.0), indexed by stage number - 1.
    pub stage_ratios: [f64; 5],

    /// Minimum affected percentage (0.0 - 1.0) below which a detector emits
    /// no pattern. Prevents noise from rare anomalies.
    /// Default: 0.01 (1%)
    pub min_affected_percentage: f64,

    /// Change rate at or below which two consecutive rule sets count as
    /// converged. Default: 0.02 (2%)
    pub convergence_threshold: f64,

    /// Confidence above which an auto-resolvable rule is approved without
    /// review, attributed to "system". Default: 0.95
    pub auto_approve_threshold: f64,

    /// Recency-weighted confidence a rule must reach to count as stable.
    /// Default: 0.98
    pub stability_threshold: f64,

    /// Maximum confidence-history variance for a rule to count as stable.
    /// Default: 0.05
    pub max_variance: f64,

    /// Number of consecutive samples without a new rule required for global
    /// convergence. Default: 500
    pub required_stable_samples: usize,

    /// Standard-deviation multiplier for outlier detection.
    /// Default: 3.0
    pub outlier_std_multiplier: f64,

    /// Maximum distinct levels for a string column to be treated as
    /// categorical by the category-variation detector. Default: 30
    pub max_category_levels: usize,

    /// Composite confidence the ConfidenceCheckpoint stage must reach before
    /// auto-approving remaining rules. Default: 0.85
    pub min_composite_confidence: f64,

    /// Whether the ConfidenceCheckpoint stage may approve remaining rules
    /// once the composite confidence clears the threshold. Default: true
    pub enable_auto_approval: bool,

    /// Skip the HITL stage entirely, auto-approving every pending rule with
    /// an explicit "auto-approved (HITL skipped)" attribution.
    /// Default: false
    pub skip_hitl: bool,

    /// Write a checkpoint after every stage. Default: true
    pub enable_checkpointing: bool,

    /// Directory for checkpoint files. Default: "checkpoints"
    pub checkpoint_dir: PathBuf,

    /// Base seed for sampling. Each stage derives its own seed from this
    /// value plus the stage number so resumed runs reproduce the same
    /// trajectory. Default: 0
    pub seed: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            stage_ratios: DEFAULT_STAGE_RATIOS,
            min_affected_percentage: 0.01,
            convergence_threshold: 0.02,
            auto_approve_threshold: 0.95,
            stability_threshold: 0.98,
            max_variance: 0.05,
            required_stable_samples: 500,
            outlier_std_multiplier: 3.0,
            max_category_levels: 30,
            min_composite_confidence: 0.85,
            enable_auto_approval: true,
            skip_hitl: false,
            enable_checkpointing: true,
            checkpoint_dir: PathBuf::from("checkpoints"),
            seed: 0,
        }
    }
}

impl WorkflowConfig {
    /// Create a new configuration builder.
    pub fn builder() -> WorkflowConfigBuilder {
        WorkflowConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        for (i, ratio) in self.stage_ratios.iter().enumerate() {
            if !(*ratio > 0.0 && *ratio <= 1.0) {
                return Err(ConfigValidationError::InvalidRatio {
                    stage: i + 1,
                    value: *ratio,
                });
            }
        }

        for (field, value) in [
            ("min_affected_percentage", self.min_affected_percentage),
            ("convergence_threshold", self.convergence_threshold),
            ("auto_approve_threshold", self.auto_approve_threshold),
            ("stability_threshold", self.stability_threshold),
            ("max_variance", self.max_variance),
            ("min_composite_confidence", self.min_composite_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigValidationError::InvalidThreshold {
                    field: field.to_string(),
                    value,
                });
            }
        }

        if self.outlier_std_multiplier <= 0.0 {
            return Err(ConfigValidationError::InvalidStdMultiplier(
                self.outlier_std_multiplier,
            ));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid sample ratio for stage {stage}: {value} (must be in (0.0, 1.0])")]
    InvalidRatio { stage: usize, value: f64 },

    #[error("Invalid outlier std multiplier: {0} (must be positive)")]
    InvalidStdMultiplier(f64),
}

/// Builder for [`WorkflowConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct WorkflowConfigBuilder {
    stage_ratios: Option<[f64; 5]>,
    min_affected_percentage: Option<f64>,
    convergence_threshold: Option<f64>,
    auto_approve_threshold: Option<f64>,
    stability_threshold: Option<f64>,
    max_variance: Option<f64>,
    required_stable_samples: Option<usize>,
    outlier_std_multiplier: Option<f64>,
    max_category_levels: Option<usize>,
    min_composite_confidence: Option<f64>,
    enable_auto_approval: Option<bool>,
    skip_hitl: Option<bool>,
    enable_checkpointing: Option<bool>,
    checkpoint_dir: Option<PathBuf>,
    seed: Option<u64>,
}

impl WorkflowConfigBuilder {
    /// Override the per-stage sample ratios.
    pub fn stage_ratios(mut self, ratios: [f64; 5]) -> Self {
        self.stage_ratios = Some(ratios);
        self
    }

    /// Set the minimum affected percentage below which detectors stay quiet.
    pub fn min_affected_percentage(mut self, value: f64) -> Self {
        self.min_affected_percentage = Some(value);
        self
    }

    /// Set the rule-set change rate at which discovery counts as converged.
    pub fn convergence_threshold(mut self, value: f64) -> Self {
        self.convergence_threshold = Some(value);
        self
    }

    /// Set the confidence above which auto-resolvable rules skip review.
    pub fn auto_approve_threshold(mut self, value: f64) -> Self {
        self.auto_approve_threshold = Some(value);
        self
    }

    /// Set the weighted confidence a rule needs to count as stable.
    pub fn stability_threshold(mut self, value: f64) -> Self {
        self.stability_threshold = Some(value);
        self
    }

    /// Set the maximum history variance for a rule to count as stable.
    pub fn max_variance(mut self, value: f64) -> Self {
        self.max_variance = Some(value);
        self
    }

    /// Set the no-new-rule sample window for global convergence.
    pub fn required_stable_samples(mut self, value: usize) -> Self {
        self.required_stable_samples = Some(value);
        self
    }

    /// Set the standard-deviation multiplier for outlier detection.
    pub fn outlier_std_multiplier(mut self, value: f64) -> Self {
        self.outlier_std_multiplier = Some(value);
        self
    }

    /// Set the maximum distinct levels for categorical treatment.
    pub fn max_category_levels(mut self, value: usize) -> Self {
        self.max_category_levels = Some(value);
        self
    }

    /// Set the composite confidence required by the checkpoint stage.
    pub fn min_composite_confidence(mut self, value: f64) -> Self {
        self.min_composite_confidence = Some(value);
        self
    }

    /// Enable or disable auto-approval at the confidence checkpoint.
    pub fn enable_auto_approval(mut self, enable: bool) -> Self {
        self.enable_auto_approval = Some(enable);
        self
    }

    /// Skip the HITL stage, auto-approving pending rules with an audit trail.
    pub fn skip_hitl(mut self, skip: bool) -> Self {
        self.skip_hitl = Some(skip);
        self
    }

    /// Enable or disable checkpointing after every stage.
    pub fn enable_checkpointing(mut self, enable: bool) -> Self {
        self.enable_checkpointing = Some(enable);
        self
    }

    /// Set the directory checkpoint files are written to.
    pub fn checkpoint_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = Some(path.into());
        self
    }

    /// Set the base sampling seed for reproducible runs.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `WorkflowConfig` or an error if validation fails.
    pub fn build(self) -> Result<WorkflowConfig, ConfigValidationError> {
        let defaults = WorkflowConfig::default();
        let config = WorkflowConfig {
            stage_ratios: self.stage_ratios.unwrap_or(defaults.stage_ratios),
            min_affected_percentage: self
                .min_affected_percentage
                .unwrap_or(defaults.min_affected_percentage),
            convergence_threshold: self
                .convergence_threshold
                .unwrap_or(defaults.convergence_threshold),
            auto_approve_threshold: self
                .auto_approve_threshold
                .unwrap_or(defaults.auto_approve_threshold),
            stability_threshold: self
                .stability_threshold
                .unwrap_or(defaults.stability_threshold),
            max_variance: self.max_variance.unwrap_or(defaults.max_variance),
            required_stable_samples: self
                .required_stable_samples
                .unwrap_or(defaults.required_stable_samples),
            outlier_std_multiplier: self
                .outlier_std_multiplier
                .unwrap_or(defaults.outlier_std_multiplier),
            max_category_levels: self
                .max_category_levels
                .unwrap_or(defaults.max_category_levels),
            min_composite_confidence: self
                .min_composite_confidence
                .unwrap_or(defaults.min_composite_confidence),
            enable_auto_approval: self
                .enable_auto_approval
                .unwrap_or(defaults.enable_auto_approval),
            skip_hitl: self.skip_hitl.unwrap_or(defaults.skip_hitl),
            enable_checkpointing: self
                .enable_checkpointing
                .unwrap_or(defaults.enable_checkpointing),
            checkpoint_dir: self.checkpoint_dir.unwrap_or(defaults.checkpoint_dir),
            seed: self.seed.unwrap_or(defaults.seed),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WorkflowConfig::default();
        assert_eq!(config.stage_ratios, [0.001, 0.005, 0.015, 0.025, 1.0]);
        assert_eq!(config.min_affected_percentage, 0.01);
        assert_eq!(config.convergence_threshold, 0.02);
        assert_eq!(config.auto_approve_threshold, 0.95);
        assert_eq!(config.stability_threshold, 0.98);
        assert_eq!(config.max_variance, 0.05);
        assert_eq!(config.required_stable_samples, 500);
        assert!(!config.skip_hitl);
        assert!(config.enable_checkpointing);
    }

    #[test]
    fn test_builder_defaults_validate() {
        let config = WorkflowConfig::builder().build().unwrap();
        assert_eq!(config.outlier_std_multiplier, 3.0);
    }

    #[test]
    fn test_builder_custom_values() {
        let config = WorkflowConfig::builder()
            .convergence_threshold(0.05)
            .skip_hitl(true)
            .seed(42)
            .checkpoint_dir("/tmp/cps")
            .enable_checkpointing(false)
            .build()
            .unwrap();

        assert_eq!(config.convergence_threshold, 0.05);
        assert!(config.skip_hitl);
        assert_eq!(config.seed, 42);
        assert!(!config.enable_checkpointing);
    }

    #[test]
    fn test_validation_invalid_threshold() {
        let result = WorkflowConfig::builder().convergence_threshold(1.5).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidThreshold { .. }
        ));
    }

    #[test]
    fn test_validation_invalid_ratio() {
        let result = WorkflowConfig::builder()
            .stage_ratios([0.0, 0.005, 0.015, 0.025, 1.0])
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidRatio { stage: 1, .. }
        ));
    }

    #[test]
    fn test_validation_invalid_std_multiplier() {
        let result = WorkflowConfig::builder().outlier_std_multiplier(0.0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidStdMultiplier(_)
        ));
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = WorkflowConfig::builder().seed(7).build().unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let restored: WorkflowConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.seed, 7);
        assert_eq!(restored.stage_ratios, config.stage_ratios);
        assert_eq!(restored.checkpoint_dir, config.checkpoint_dir);
    }
}
