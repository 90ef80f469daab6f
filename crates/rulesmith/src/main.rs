//! CLI entry point for the rule discovery workflow.

use anyhow::{Result, anyhow};
use clap::Parser;
use rulesmith::{
    ClosureProgressReporter, CsvSource, Workflow, WorkflowConfig, WorkflowState,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "rulesmith",
    version,
    about = "Incremental data-quality rule discovery",
    long_about = "Discovers data-quality preprocessing rules from a CSV dataset through \
                  a five-stage sampling workflow with convergence detection and \
                  human-in-the-loop review.\n\n\
                  EXAMPLES:\n  \
                  # Discover rules, approving everything automatically\n  \
                  rulesmith -i data.csv --skip-hitl\n\n  \
                  # Resume an interrupted session from its last checkpoint\n  \
                  rulesmith -i data.csv --resume checkpoints/wf-20260830_stage3.json\n\n  \
                  # Machine-readable output\n  \
                  rulesmith -i data.csv --skip-hitl --json | jq .discovered_rules"
)]
struct Args {
    /// Path to the CSV file to analyze
    #[arg(short, long)]
    input: String,

    /// Directory for per-stage checkpoint files
    #[arg(long, default_value = "checkpoints")]
    checkpoint_dir: String,

    /// Resume from a checkpoint file instead of starting fresh
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Approve all review-required rules without prompting
    #[arg(long)]
    skip_hitl: bool,

    /// Base seed for stage sampling
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Change rate at or below which a stage counts as converged
    #[arg(long, default_value = "0.02")]
    convergence_threshold: f64,

    /// Output the final workflow state as JSON instead of a summary
    ///
    /// Disables all progress logs; only outputs the final JSON state.
    #[arg(long)]
    json: bool,

    /// Suppress progress output (only show warnings and errors)
    #[arg(short, long)]
    quiet: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled so stdout
/// only carries the JSON state.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    if !Path::new(&args.input).exists() {
        return Err(anyhow!("Input file not found: {}", args.input));
    }

    let config = WorkflowConfig::builder()
        .checkpoint_dir(&args.checkpoint_dir)
        .skip_hitl(args.skip_hitl)
        .seed(args.seed)
        .convergence_threshold(args.convergence_threshold)
        .build()?;

    info!("Loading dataset from: {}", args.input);
    let source = Arc::new(CsvSource::load(&args.input)?);

    let show_progress = !args.json && !args.quiet;
    let mut builder = Workflow::builder().config(config).source(source);
    if show_progress {
        builder = builder.reporter(Arc::new(ClosureProgressReporter::new(|p| {
            println!(
                "[{:>3.0}%] {} - {} rule(s), confidence {:.2}{}",
                p.progress * 100.0,
                p.message,
                p.rules_discovered,
                p.confidence,
                if p.converged { ", converged" } else { "" }
            );
        })));
    }
    let mut workflow = builder.build()?;

    let state = match &args.resume {
        Some(path) => workflow.resume(path)?,
        None => workflow.run()?,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print_summary(&state);
    }

    Ok(())
}

/// Human-readable final summary. Intentionally `println!` rather than
/// logging so it is visible at any log level.
fn print_summary(state: &WorkflowState) {
    println!("\n{}", "=".repeat(72));
    println!("RULE DISCOVERY SUMMARY - session {}", state.session_id);
    println!("{}", "=".repeat(72));
    println!("  Dataset:     {} ({} rows)", state.dataset_path, state.total_records);
    println!("  Converged:   {}", if state.has_converged { "yes" } else { "no" });
    println!("  Confidence:  {:.3}", state.confidence_score);
    println!("  Rules:       {} discovered, {} approved",
        state.discovered_rules.len(),
        state.approved_rules.len()
    );

    if !state.discovered_rules.is_empty() {
        println!("\n  {:<34} {:<10} {:<9} {:<8} approved", "rule", "severity", "priority", "rows");
        println!("  {}", "-".repeat(70));
        for rule in &state.discovered_rules {
            println!(
                "  {:<34} {:<10} {:<9} {:<8} {}",
                truncate_str(&rule.id, 33),
                format!("{:?}", rule.severity),
                rule.priority,
                rule.affected_rows,
                if rule.is_approved {
                    rule.approved_by.as_deref().unwrap_or("yes")
                } else {
                    "pending"
                }
            );
        }
    }

    if let Some(bulk) = state.completed_stages.get(&5) {
        if !bulk.notes.is_empty() {
            println!("\n  Bulk processing:");
            for note in &bulk.notes {
                println!("    - {note}");
            }
        }
    }
    println!();
}

fn truncate_str(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}…", &s[..s.char_indices().take(max - 1).last().map(|(i, c)| i + c.len_utf8()).unwrap_or(0)])
    }
}
