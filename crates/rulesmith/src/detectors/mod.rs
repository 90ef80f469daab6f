//! Pattern detectors: independently pluggable inspectors, each specialized
//! to one data-quality pattern.
//!
//! Detectors are registered statically in [`all_detectors`]; there is no
//! runtime plugin loading. A failure in one detector is isolated: it is
//! logged, recorded as a note, and the remaining detectors keep running, so
//! partial results are acceptable.

mod category;
mod dates;
mod encoding;
mod missing;
mod outlier;
mod types;
mod whitespace;

pub use category::CategoryVariationDetector;
pub use dates::DateFormatDetector;
pub use encoding::EncodingAnomalyDetector;
pub use missing::{MissingValueDetector, is_missing_token};
pub use outlier::OutlierDetector;
pub use types::TypeInconsistencyDetector;
pub use whitespace::WhitespaceDetector;

use crate::config::WorkflowConfig;
use crate::error::{DiscoveryError, Result};
use crate::types::{DetectedPattern, MAX_EXAMPLES};
use polars::prelude::*;
use tracing::{debug, warn};

/// Contract for one data-quality pattern detector.
///
/// `detect` inspects a single column and emits zero or more patterns;
/// `is_applicable` lets detectors skip columns of the wrong shape (e.g.
/// the outlier detector only applies to numeric columns).
pub trait PatternDetector: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_applicable(&self, column: &Series) -> bool;

    fn detect(&self, column: &Series, config: &WorkflowConfig)
    -> Result<Vec<DetectedPattern>>;
}

/// The fixed detector registry, in deterministic execution order.
pub fn all_detectors() -> Vec<Box<dyn PatternDetector>> {
    vec![
        Box::new(MissingValueDetector),
        Box::new(WhitespaceDetector),
        Box::new(TypeInconsistencyDetector),
        Box::new(DateFormatDetector),
        Box::new(OutlierDetector),
        Box::new(CategoryVariationDetector),
        Box::new(EncodingAnomalyDetector),
    ]
}

/// Aggregated result of running every applicable detector over a sample.
#[derive(Debug, Default)]
pub struct DetectionOutcome {
    pub patterns: Vec<DetectedPattern>,
    /// Human-readable descriptions of detector soft failures, surfaced in
    /// the stage notes.
    pub failures: Vec<String>,
}

/// Run every applicable detector over every column of the sample.
///
/// Column order times fixed registry order keeps the raw pattern output
/// deterministic; the discovery engine applies the final priority sort.
pub fn run_detectors(df: &DataFrame, config: &WorkflowConfig) -> DetectionOutcome {
    let detectors = all_detectors();
    let mut outcome = DetectionOutcome::default();

    for column in df.get_columns() {
        let series = column.as_materialized_series();
        for detector in &detectors {
            if !detector.is_applicable(series) {
                continue;
            }
            match detector.detect(series, config) {
                Ok(patterns) => {
                    if !patterns.is_empty() {
                        debug!(
                            "{} found {} pattern(s) in '{}'",
                            detector.name(),
                            patterns.len(),
                            series.name()
                        );
                    }
                    outcome.patterns.extend(patterns);
                }
                Err(e) => {
                    let failure = DiscoveryError::DetectorFailed {
                        detector: detector.name().to_string(),
                        column: series.name().to_string(),
                        reason: e.to_string(),
                    };
                    warn!(error = %failure, "detector skipped");
                    outcome.failures.push(failure.to_string());
                }
            }
        }
    }

    outcome
}

/// Collect up to [`MAX_EXAMPLES`] literal offending values.
pub(crate) fn bounded_examples<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values
        .into_iter()
        .take(MAX_EXAMPLES)
        .map(Into::into)
        .collect()
}
