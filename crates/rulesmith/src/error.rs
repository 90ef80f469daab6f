//! Custom error types for the rule discovery workflow.
//!
//! This module provides the error hierarchy using `thiserror` for better
//! error handling and context throughout the workflow. Errors are
//! serializable so they can be forwarded to a frontend or logged as JSON.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the discovery workflow.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Workflow was cancelled by user.
    #[error("Workflow cancelled")]
    Cancelled,

    /// Dataset could not be loaded. Fatal: the workflow cannot proceed
    /// without data.
    #[error("Failed to load dataset '{path}': {reason}")]
    DatasetLoad { path: String, reason: String },

    /// A sampling pass produced no rows.
    #[error("Sampling produced an empty dataset (ratio {ratio})")]
    EmptySample { ratio: f64 },

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A single pattern detector failed on one column. Soft failure: the
    /// stage logs it and continues with the remaining detectors.
    #[error("Detector '{detector}' failed on column '{column}': {reason}")]
    DetectorFailed {
        detector: String,
        column: String,
        reason: String,
    },

    /// A checkpoint file could not be loaded or deserialized. Fatal when
    /// resuming: the caller must be told rather than silently starting fresh.
    #[error("Checkpoint '{path}' is unusable: {reason}")]
    CheckpointUnusable { path: String, reason: String },

    /// No decision provider was configured for a stage that requires one.
    #[error("HITL decisions required but no decision provider configured")]
    NoDecisionProvider,

    /// Rule application by the external engine failed.
    #[error("Failed to apply rule '{rule_id}': {reason}")]
    RuleApplicationFailed { rule_id: String, reason: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<DiscoveryError>,
    },
}

impl DiscoveryError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        DiscoveryError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get a stable error code for programmatic handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Cancelled => "CANCELLED",
            Self::DatasetLoad { .. } => "DATASET_LOAD_FAILED",
            Self::EmptySample { .. } => "EMPTY_SAMPLE",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::DetectorFailed { .. } => "DETECTOR_FAILED",
            Self::CheckpointUnusable { .. } => "CHECKPOINT_UNUSABLE",
            Self::NoDecisionProvider => "NO_DECISION_PROVIDER",
            Self::RuleApplicationFailed { .. } => "RULE_APPLICATION_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Check if this error is fatal to the whole workflow (as opposed to a
    /// per-detector or per-rule soft failure).
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::DetectorFailed { .. } | Self::RuleApplicationFailed { .. }
        )
    }
}

/// Serialize errors as `{ code, message }` for log shipping / frontends.
impl Serialize for DiscoveryError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("DiscoveryError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for discovery operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| DiscoveryError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(DiscoveryError::Cancelled.error_code(), "CANCELLED");
        assert_eq!(
            DiscoveryError::ColumnNotFound("age".to_string()).error_code(),
            "COLUMN_NOT_FOUND"
        );
        assert_eq!(
            DiscoveryError::CheckpointUnusable {
                path: "cp.json".to_string(),
                reason: "truncated".to_string(),
            }
            .error_code(),
            "CHECKPOINT_UNUSABLE"
        );
    }

    #[test]
    fn test_is_cancelled_through_context() {
        let err = DiscoveryError::Cancelled.with_context("during HITL");
        assert!(err.is_cancelled());
        assert!(!DiscoveryError::NoDecisionProvider.is_cancelled());
    }

    #[test]
    fn test_detector_failure_is_not_fatal() {
        let err = DiscoveryError::DetectorFailed {
            detector: "outlier".to_string(),
            column: "price".to_string(),
            reason: "cast failed".to_string(),
        };
        assert!(!err.is_fatal());
        assert!(
            DiscoveryError::DatasetLoad {
                path: "x.csv".to_string(),
                reason: "not found".to_string(),
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_error_serialization() {
        let err = DiscoveryError::ColumnNotFound("Age".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("COLUMN_NOT_FOUND"));
        assert!(json.contains("Age"));
    }

    #[test]
    fn test_with_context_preserves_code() {
        let err = DiscoveryError::EmptySample { ratio: 0.001 }.with_context("stage 1");
        assert!(err.to_string().contains("stage 1"));
        assert_eq!(err.error_code(), "EMPTY_SAMPLE");
    }
}
