//! Path utilities for Mochi data directories.

use std::path::PathBuf;

use crate::DEFAULT_MODEL_FILENAME;

/// Get the Mochi data directory (~/.mochi/).
pub fn mochi_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".mochi"))
}

/// Get the models directory (~/.mochi/models/).
pub fn models_dir() -> Option<PathBuf> {
    mochi_data_dir().map(|dir| dir.join("models"))
}

/// Get the default model path (~/.mochi/models/tiny-llm.bin).
pub fn default_model_path() -> Option<PathBuf> {
    models_dir().map(|dir| dir.join(DEFAULT_MODEL_FILENAME))
}

/// Ensure the models directory exists.
pub fn ensure_dirs() -> std::io::Result<PathBuf> {
    let dir = models_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "could not determine home directory",
        )
    })?;
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
