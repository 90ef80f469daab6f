//! Checkpoint persistence: one JSON file per completed stage.

use crate::error::{DiscoveryError, Result};
use crate::types::WorkflowState;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name for a session's checkpoint after the given stage number.
pub fn checkpoint_file_name(session_id: &str, stage_number: u8) -> String {
    format!("{session_id}_stage{stage_number}.json")
}

/// Write the state to `{dir}/{session_id}_stage{N}.json`, creating the
/// directory if needed. Returns the written path.
pub fn save(state: &WorkflowState, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(checkpoint_file_name(
        &state.session_id,
        state.current_stage.number(),
    ));
    let json = serde_json::to_string_pretty(state)?;
    fs::write(&path, json)?;
    debug!(path = %path.display(), stage = state.current_stage.number(), "checkpoint written");
    Ok(path)
}

/// Load a checkpoint for resume. Any failure is fatal; a corrupt or
/// unreadable checkpoint must never silently become a fresh start.
pub fn load(path: &Path) -> Result<WorkflowState> {
    let raw = fs::read_to_string(path).map_err(|e| DiscoveryError::CheckpointUnusable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let state: WorkflowState =
        serde_json::from_str(&raw).map_err(|e| DiscoveryError::CheckpointUnusable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    info!(
        path = %path.display(),
        session_id = %state.session_id,
        stage = state.current_stage.number(),
        "checkpoint loaded"
    );
    Ok(state)
}
