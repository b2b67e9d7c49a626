use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::classifier::{ClassifierError, TrainedModel};

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Malformed model file: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Returns the default models directory path
pub fn default_models_dir() -> PathBuf {
    // 1. Use platform-specific cache directory
    if let Some(cache_dir) = dirs::cache_dir() {
        return cache_dir.join("imagefront").join("models");
    }

    // 2. Fallback to user's home directory
    if let Some(home_dir) = dirs::home_dir() {
        return home_dir.join(".cache").join("imagefront").join("models");
    }

    // 3. If all else fails, use system temp directory (platform agnostic)
    env::temp_dir().join("imagefront").join("models")
}

/// Default location of the saved model when the caller does not pick one
pub fn default_model_path() -> PathBuf {
    default_models_dir().join("model.json")
}

/// Writes `model` to `path`, creating parent directories.
///
/// The file is written next to its destination and renamed into place, so a
/// reader never sees a half-written model.
pub fn save_model(model: &TrainedModel, path: impl AsRef<Path>) -> Result<(), ClassifierError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        log::debug!("Creating parent directory: {:?}", parent);
        fs::create_dir_all(parent).map_err(ModelError::from)?;
    }

    let bytes = serde_json::to_vec(model).map_err(ModelError::from)?;
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    log::info!("Writing {} bytes to {:?}", bytes.len(), path);
    fs::write(&tmp_path, &bytes).map_err(ModelError::from)?;
    fs::rename(&tmp_path, path).map_err(ModelError::from)?;
    Ok(())
}

/// Reads a model written by [`save_model`] and checks its layout.
pub fn load_model(path: impl AsRef<Path>) -> Result<TrainedModel, ClassifierError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ModelError::NotFound(path.to_path_buf()).into());
    }
    let bytes = fs::read(path).map_err(ModelError::from)?;
    log::info!("Read {} bytes from {:?}", bytes.len(), path);
    let model: TrainedModel = serde_json::from_slice(&bytes).map_err(ModelError::from)?;
    model.validate()?;
    Ok(model)
}

/// Hex SHA-256 of a file's contents
pub fn file_sha256(path: impl AsRef<Path>) -> io::Result<String> {
    let bytes = fs::read(path.as_ref())?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}
