//! Model file cache
//!
//! Models live as flat `<name>.onnx` files in a single directory, the same
//! layout rembg uses, so an existing `~/.u2net` is picked up as is.

use crate::error::{BgRemovalError, Result};
use crate::models::ModelKind;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the cache directory
pub const MODEL_HOME_ENV: &str = "U2NET_HOME";

/// Model cache manager
#[derive(Debug, Clone)]
pub struct ModelCache {
    cache_dir: PathBuf,
}

impl ModelCache {
    /// Open the cache, creating the directory when needed
    ///
    /// `model_home` takes precedence; otherwise `~/.u2net` is used.
    ///
    /// # Errors
    /// - Home directory cannot be determined
    /// - Cache directory cannot be created
    pub fn new(model_home: Option<&Path>) -> Result<Self> {
        let cache_dir = match model_home {
            Some(dir) => dir.to_path_buf(),
            None => Self::default_cache_dir()?,
        };

        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).map_err(|e| {
                BgRemovalError::file_io_error("create model cache directory", &cache_dir, &e)
            })?;
        }

        Ok(Self { cache_dir })
    }

    /// `~/.u2net`
    ///
    /// # Errors
    /// - Home directory cannot be determined
    pub fn default_cache_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".u2net"))
            .ok_or_else(|| {
                BgRemovalError::invalid_config(format!(
                    "Failed to determine home directory. Set {MODEL_HOME_ENV} environment variable."
                ))
            })
    }

    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path of a model file (may not exist)
    #[must_use]
    pub fn get_model_path(&self, kind: ModelKind) -> PathBuf {
        self.cache_dir.join(kind.file_name())
    }

    /// A model counts as cached when its file exists and is not empty
    #[must_use]
    pub fn is_model_cached(&self, kind: ModelKind) -> bool {
        fs::metadata(self.get_model_path(kind))
            .map(|meta| meta.is_file() && meta.len() > 0)
            .unwrap_or(false)
    }
}
