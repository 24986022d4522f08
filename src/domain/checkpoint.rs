//! Monitor Checkpoints
//!
//! Optional on-disk record of each monitor's state, written on every
//! high-water mark raise and phase transition. Used by the `status` command
//! and to find positions whose sell failed. Nothing here is on the trading
//! path: callers log write failures and carry on.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::manifest::LiquidationManifest;
use super::position::Position;
use super::stop_loss::{MonitorState, Phase, StopLossFraction};

const POSITIONS_DIR: &str = "positions";
const MANIFESTS_DIR: &str = "manifests";

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Failed to serialize checkpoint: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Checkpoint I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Persisted snapshot of one monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorCheckpoint {
    pub position: Position,
    pub high_water_mark: Decimal,
    pub stop_loss_fraction: StopLossFraction,
    pub phase: Phase,
    pub updated_at: DateTime<Utc>,
}

impl From<&MonitorState> for MonitorCheckpoint {
    fn from(state: &MonitorState) -> Self {
        Self {
            position: state.position().clone(),
            high_water_mark: state.high_water_mark(),
            stop_loss_fraction: state.stop_loss_fraction(),
            phase: state.phase().clone(),
            updated_at: Utc::now(),
        }
    }
}

impl MonitorCheckpoint {
    pub fn into_state(self) -> MonitorState {
        MonitorState::restore(
            self.position,
            self.stop_loss_fraction,
            self.high_water_mark,
            self.phase,
        )
    }
}

/// Directory-backed checkpoint store
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    data_dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the checkpoint file for a position
    ///
    /// Keyed by chain, token and acquisition time, so a token bought again in
    /// a later batch never shares a file with the earlier holding.
    pub fn checkpoint_path(&self, position: &Position) -> PathBuf {
        let name = format!(
            "{}-{}-{}.json",
            sanitize(&position.chain.blockchain),
            sanitize(&position.token),
            position.acquired_at.format("%Y%m%dT%H%M%S%6fZ")
        );
        self.data_dir.join(POSITIONS_DIR).join(name)
    }

    /// Load the checkpoint for one position, if any
    pub fn load(&self, position: &Position) -> Result<Option<MonitorCheckpoint>, CheckpointError> {
        let path = self.checkpoint_path(position);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|source| CheckpointError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, state: &MonitorState) -> Result<PathBuf, CheckpointError> {
        let path = self.checkpoint_path(state.position());
        let content = serde_json::to_string_pretty(&MonitorCheckpoint::from(state))?;
        write_file(&path, &content)?;

        tracing::debug!(
            "Checkpoint saved: {} H={} ({})",
            state.position().label(),
            state.high_water_mark(),
            path.display()
        );
        Ok(path)
    }

    pub fn remove(&self, position: &Position) -> Result<(), CheckpointError> {
        let path = self.checkpoint_path(position);
        if path.exists() {
            fs::remove_file(&path).map_err(|source| CheckpointError::Io {
                path: path.clone(),
                source,
            })?;
            tracing::debug!("Checkpoint removed: {}", path.display());
        }
        Ok(())
    }

    /// Load every readable checkpoint. Corrupted files are logged and skipped.
    pub fn load_all(&self) -> Result<Vec<MonitorCheckpoint>, CheckpointError> {
        let dir = self.data_dir.join(POSITIONS_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&dir).map_err(|source| CheckpointError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut checkpoints = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!("Skipping unreadable checkpoint {}: {}", path.display(), e);
                    continue;
                }
            };

            match serde_json::from_str::<MonitorCheckpoint>(&content) {
                Ok(checkpoint) => checkpoints.push(checkpoint),
                Err(e) => tracing::warn!("Skipping corrupted checkpoint {}: {}", path.display(), e),
            }
        }

        checkpoints.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        Ok(checkpoints)
    }

    /// Write a liquidation manifest under `manifests/`
    pub fn save_manifest(&self, manifest: &LiquidationManifest) -> Result<PathBuf, CheckpointError> {
        let name = format!("{}.json", manifest.completed_at.format("%Y%m%dT%H%M%S%.3fZ"));
        let path = self.data_dir.join(MANIFESTS_DIR).join(name);
        let content = serde_json::to_string_pretty(manifest)?;
        write_file(&path, &content)?;

        tracing::info!("Liquidation manifest written: {}", path.display());
        Ok(path)
    }
}

fn write_file(path: &Path, content: &str) -> Result<(), CheckpointError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| CheckpointError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(path, content).map_err(|source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '-' })
        .collect()
}
