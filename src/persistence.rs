//! Artifact persistence - save and load the fitted encoder and model

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::config::ArtifactsConfig;
use crate::encoder::OneHotEncoder;
use crate::model::{FittedModel, ModelError};

/// Errors that can occur during artifact persistence
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Artifact file not found: {0}")]
    FileNotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Deserialization error in {path}: {reason}")]
    Deserialize { path: String, reason: String },
    #[error("Artifact version mismatch: expected v{expected}, found v{found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("Invalid model artifact: {0}")]
    InvalidModel(#[from] ModelError),
}

/// Versioned envelope around a persisted artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactFile<T> {
    /// Version for backward compatibility
    pub version: u32,
    /// When the artifact was written
    pub created_at: DateTime<Utc>,
    pub payload: T,
}

impl<T> ArtifactFile<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Current version number
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(payload: T) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            created_at: Utc::now(),
            payload,
        }
    }

    /// Save as pretty-printed JSON, creating parent directories if needed.
    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PersistenceError::Serialize(e.to_string()))?;

        fs::write(path, json)?;

        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        if !path.exists() {
            return Err(PersistenceError::FileNotFound(
                path.to_string_lossy().to_string(),
            ));
        }

        let bytes = fs::read(path)?;

        let artifact: Self =
            serde_json::from_slice(&bytes).map_err(|e| PersistenceError::Deserialize {
                path: path.to_string_lossy().to_string(),
                reason: e.to_string(),
            })?;

        if artifact.version > Self::CURRENT_VERSION {
            return Err(PersistenceError::VersionMismatch {
                expected: Self::CURRENT_VERSION,
                found: artifact.version,
            });
        }

        Ok(artifact)
    }
}

/// The fitted encoder and model, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub encoder: OneHotEncoder,
    pub model: FittedModel,
}

impl Artifacts {
    pub fn load(config: &ArtifactsConfig) -> Result<Self, PersistenceError> {
        let encoder = ArtifactFile::<OneHotEncoder>::load(&config.encoder_path)?;
        tracing::info!(
            path = %config.encoder_path.display(),
            created_at = %encoder.created_at,
            columns = encoder.payload.width(),
            "Loaded encoder artifact"
        );

        let model = ArtifactFile::<FittedModel>::load(&config.model_path)?;
        model.payload.validate()?;
        tracing::info!(
            path = %config.model_path.display(),
            created_at = %model.created_at,
            "Loaded model artifact"
        );

        Ok(Self {
            encoder: encoder.payload,
            model: model.payload,
        })
    }

    pub fn save(&self, config: &ArtifactsConfig) -> Result<(), PersistenceError> {
        ArtifactFile::new(self.encoder.clone()).save(&config.encoder_path)?;
        ArtifactFile::new(self.model.clone()).save(&config.model_path)?;
        Ok(())
    }
}
