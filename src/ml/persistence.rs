//! Model persistence - save and load trained models

use std::fs;
use std::path::{Path, PathBuf};

use bincode::Options;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::TrainedModel;

/// Leading bytes of every model artifact.
const MAGIC: &[u8; 4] = b"SCFM";

/// Artifacts larger than this are rejected before decoding.
const MAX_ARTIFACT_BYTES: u64 = 256 * 1024 * 1024;

/// On-disk envelope around a trained model
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedModel {
    /// Version for backward compatibility
    pub version: u32,
    /// When the artifact was written
    pub saved_at: DateTime<Utc>,
    pub model: TrainedModel,
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
        .with_limit(MAX_ARTIFACT_BYTES)
}

impl PersistedModel {
    /// Current version number
    pub const CURRENT_VERSION: u32 = 1;

    /// Wrap a trained model for saving
    pub fn new(model: TrainedModel) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            saved_at: Utc::now(),
            model,
        }
    }

    /// Save to a file, replacing any previous artifact.
    ///
    /// The bytes go to a sibling temp file first and are renamed into place,
    /// so a concurrent reader sees either the old or the new artifact.
    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        // Create parent directories if needed
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PersistenceError::IoError(e.to_string()))?;
        }

        let mut bytes = MAGIC.to_vec();
        let payload = codec()
            .serialize(self)
            .map_err(|e| PersistenceError::SerializeError(e.to_string()))?;
        bytes.extend_from_slice(&payload);

        let tmp = temp_path(path);
        fs::write(&tmp, bytes).map_err(|e| PersistenceError::IoError(e.to_string()))?;
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            PersistenceError::IoError(e.to_string())
        })?;

        Ok(())
    }

    /// Load from a file
    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        if !path.exists() {
            return Err(PersistenceError::FileNotFound(path.to_path_buf()));
        }

        let size = fs::metadata(path)
            .map_err(|e| PersistenceError::IoError(e.to_string()))?
            .len();
        if size > MAX_ARTIFACT_BYTES + MAGIC.len() as u64 {
            return Err(PersistenceError::TooLarge(size));
        }

        let bytes = fs::read(path).map_err(|e| PersistenceError::IoError(e.to_string()))?;

        let payload = bytes
            .strip_prefix(MAGIC.as_slice())
            .ok_or(PersistenceError::NotAnArtifact)?;

        let model: Self = codec()
            .deserialize(payload)
            .map_err(|e| PersistenceError::DeserializeError(e.to_string()))?;

        // Version check
        if model.version != Self::CURRENT_VERSION {
            return Err(PersistenceError::VersionMismatch {
                expected: Self::CURRENT_VERSION,
                found: model.version,
            });
        }

        Ok(model)
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Model v{}: {} samples, {} trees, train_mse={:.4}, saved {}",
            self.version,
            self.model.training_samples,
            self.model.n_trees,
            self.model.training_mse,
            self.saved_at.format("%Y-%m-%d %H:%M UTC")
        )
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Errors that can occur during model persistence
#[derive(Debug, Clone, thiserror::Error)]
pub enum PersistenceError {
    #[error("Model file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Model file is {0} bytes, larger than any valid artifact")]
    TooLarge(u64),
    #[error("File is not a forecast model artifact")]
    NotAnArtifact,
    #[error("Serialization error: {0}")]
    SerializeError(String),
    #[error("Deserialization error: {0}")]
    DeserializeError(String),
    #[error("Model version mismatch: expected v{expected}, found v{found}")]
    VersionMismatch { expected: u32, found: u32 },
}
