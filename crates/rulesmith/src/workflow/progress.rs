//! Progress reporting and cooperative cancellation for workflow runs.

use crate::types::WorkflowStage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Snapshot emitted after each stage completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageProgress {
    pub stage: WorkflowStage,
    /// Completed stages over five, in [0, 1].
    pub progress: f64,
    pub message: String,
    pub rules_discovered: usize,
    pub confidence: f64,
    pub converged: bool,
}

/// Receives progress snapshots. Implementations must be cheap; the workflow
/// calls them inline.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, progress: &StageProgress);
}

/// Adapts a closure into a reporter, for CLI printers and tests.
pub struct ClosureProgressReporter<F>
where
    F: Fn(&StageProgress) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(&StageProgress) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(&StageProgress) + Send + Sync,
{
    fn report(&self, progress: &StageProgress) {
        (self.callback)(progress)
    }
}

/// Reporter that drops everything, used when the caller supplies none.
pub struct NoopProgressReporter;

impl ProgressReporter for NoopProgressReporter {
    fn report(&self, _progress: &StageProgress) {}
}

/// Shared flag checked between stages and before each review question.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync, Clone);
