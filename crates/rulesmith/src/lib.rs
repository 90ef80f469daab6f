//! Incremental Data-Quality Rule Discovery
//!
//! A Polars-backed library that discovers preprocessing rules from a dataset
//! through a staged sampling workflow.
//!
//! # Overview
//!
//! The workflow runs five strictly ordered stages over progressively larger
//! samples of the dataset:
//!
//! 1. **Initial exploration** (0.1%): cheap first pass, baseline rule set
//! 2. **Pattern expansion** (0.5%): diff against the baseline, convergence check
//! 3. **HITL decision** (1.5%): review-required rules go to a decision provider
//! 4. **Confidence checkpoint** (2.5%): composite confidence, late approvals
//! 5. **Bulk processing** (100%): approved rules handed to an applicator
//!
//! Seven statistical detectors (missing values, whitespace, mixed types,
//! date formats, outliers, category variants, encoding anomalies) feed a
//! discovery engine that converts patterns into prioritized, confidence-scored
//! [`PreprocessingRule`]s. Rules are identified across stages by a stable
//! signature, so repeated sampling refines rather than duplicates them.
//! State is checkpointed to JSON after every stage and can be resumed; the
//! seeded sampling reproduces the original trajectory.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use rulesmith::{CsvSource, Workflow, WorkflowConfig};
//! use std::sync::Arc;
//!
//! let config = WorkflowConfig::builder()
//!     .skip_hitl(true)
//!     .seed(42)
//!     .build()?;
//!
//! let source = Arc::new(CsvSource::load("data.csv")?);
//!
//! let state = Workflow::builder()
//!     .config(config)
//!     .source(source)
//!     .build()?
//!     .run()?;
//!
//! for rule in &state.approved_rules {
//!     println!("{}: {}", rule.id, rule.transformation);
//! }
//! ```
//!
//! # Extension points
//!
//! Three traits connect the workflow to its surroundings:
//!
//! - [`DatasetSource`]: where the rows come from ([`CsvSource`],
//!   [`InMemorySource`], or your own)
//! - [`DecisionProvider`]: renders review questions (terminal prompt, GUI,
//!   test stub)
//! - [`RuleApplicator`]: the engine that actually rewrites data; this crate
//!   only discovers and hands off

pub mod apply;
pub mod confidence;
pub mod config;
pub mod convergence;
pub mod detectors;
pub mod discovery;
pub mod error;
pub mod hitl;
pub mod sampling;
pub mod stats;
pub mod types;
pub mod workflow;

pub use apply::{ApplyOutcome, RuleApplicator};
pub use confidence::ConfidenceCalculator;
pub use config::{WorkflowConfig, WorkflowConfigBuilder};
pub use error::{DiscoveryError, Result};
pub use hitl::DecisionProvider;
pub use sampling::{CsvSource, DatasetSource, InMemorySource};
pub use types::{
    ConfidenceScore, ConvergenceInfo, DetectedPattern, HitlAnswer, HitlDecision,
    HitlOption, HitlQuestion, PatternType, PreprocessingRule, RuleType, Severity,
    StageResult, WorkflowStage, WorkflowState,
};
pub use workflow::{
    CancellationToken, ClosureProgressReporter, ProgressReporter, StageProgress,
    Workflow, WorkflowBuilder,
};
