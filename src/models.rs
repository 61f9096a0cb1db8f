//! Segmentation model catalogue and model file management

use crate::{
    cache::ModelCache,
    config::RemovalConfig,
    download::ModelDownloader,
    error::{BgRemovalError, Result},
};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Release location of the rembg-compatible ONNX model files
pub const MODEL_RELEASE_BASE_URL: &str =
    "https://github.com/danielgatis/rembg/releases/download/v0.0.0/";

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Single-output salient object segmentation models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelKind {
    /// General purpose U2-Net (default)
    #[default]
    U2net,
    /// Lightweight U2-Net
    U2netp,
    /// Pruned U2-Net
    Silueta,
    /// `IS-Net` general use model, 1024px input
    IsnetGeneralUse,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::U2net,
        ModelKind::U2netp,
        ModelKind::Silueta,
        ModelKind::IsnetGeneralUse,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::U2net => "u2net",
            Self::U2netp => "u2netp",
            Self::Silueta => "silueta",
            Self::IsnetGeneralUse => "isnet-general-use",
        }
    }

    /// File name of the model inside the cache directory
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{}.onnx", self.name())
    }

    #[must_use]
    pub fn download_url(self) -> String {
        format!("{}{}", MODEL_RELEASE_BASE_URL, self.file_name())
    }

    /// Input resolution and normalisation the model was trained with
    #[must_use]
    pub fn preprocessing_config(self) -> PreprocessingConfig {
        match self {
            Self::U2net | Self::U2netp | Self::Silueta => PreprocessingConfig {
                target_size: [320, 320],
                normalization_mean: IMAGENET_MEAN,
                normalization_std: IMAGENET_STD,
            },
            Self::IsnetGeneralUse => PreprocessingConfig {
                target_size: [1024, 1024],
                normalization_mean: IMAGENET_MEAN,
                normalization_std: [1.0, 1.0, 1.0],
            },
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| {
                BgRemovalError::config_value_error(
                    "model",
                    s,
                    "one of: u2net, u2netp, silueta, isnet-general-use",
                )
            })
    }
}

/// Preprocessing parameters for a model
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessingConfig {
    /// Square input size as `[width, height]`
    pub target_size: [u32; 2],
    pub normalization_mean: [f32; 3],
    pub normalization_std: [f32; 3],
}

/// Model information and metadata
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub size_bytes: u64,
    pub input_shape: (usize, usize, usize, usize), // NCHW format
    pub output_shape: (usize, usize, usize, usize),
}

/// Resolves a model kind to a file on disk and loads it for the backends
#[derive(Debug, Clone)]
pub struct ModelManager {
    kind: ModelKind,
    model_path: PathBuf,
}

impl ModelManager {
    /// Create a manager for a model file that is already on disk
    pub fn from_path<P: AsRef<Path>>(kind: ModelKind, model_path: P) -> Self {
        Self {
            kind,
            model_path: model_path.as_ref().to_path_buf(),
        }
    }

    /// Locate the configured model in the cache, downloading it on first use
    ///
    /// # Errors
    /// - Cache directory cannot be determined or created
    /// - Model is missing and downloads are disabled
    /// - Download or checksum verification failures
    pub fn for_config(config: &RemovalConfig) -> Result<Self> {
        let cache = ModelCache::new(config.model_home.as_deref())?;
        let kind = config.model;

        if cache.is_model_cached(kind) {
            let model_path = cache.get_model_path(kind);
            tracing::debug!(model = %kind, path = %model_path.display(), "Using cached model");

            if let Some(expected) = config.model_sha256.as_deref() {
                if !ModelDownloader::verify_file_integrity(&model_path, Some(expected))? {
                    return Err(BgRemovalError::model_error_with_context(
                        "verify",
                        &model_path,
                        "SHA-256 digest does not match REMOVE_BG_MODEL_SHA256",
                        &["delete the file to download it again"],
                    ));
                }
            }

            return Ok(Self::from_path(kind, model_path));
        }

        if config.offline {
            return Err(BgRemovalError::model_error_with_context(
                "locate",
                cache.get_model_path(kind),
                "model file is not cached and downloads are disabled",
                &[
                    "unset REMOVE_BG_OFFLINE",
                    "place the .onnx file in U2NET_HOME",
                ],
            ));
        }

        let downloader = ModelDownloader::new(cache)?;
        let model_path = downloader.download_model(kind, config.model_sha256.as_deref())?;
        Ok(Self::from_path(kind, model_path))
    }

    #[must_use]
    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    #[must_use]
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Read the ONNX model bytes
    ///
    /// # Errors
    /// - Model file missing or unreadable
    pub fn load_model(&self) -> Result<Vec<u8>> {
        fs::read(&self.model_path)
            .map_err(|e| BgRemovalError::file_io_error("read model file", &self.model_path, &e))
    }

    /// # Errors
    /// - Model file metadata unavailable
    pub fn get_info(&self) -> Result<ModelInfo> {
        let size_bytes = fs::metadata(&self.model_path)
            .map_err(|e| BgRemovalError::file_io_error("inspect model file", &self.model_path, &e))?
            .len();
        let [width, height] = self.kind.preprocessing_config().target_size;

        Ok(ModelInfo {
            name: self.kind.name().to_string(),
            size_bytes,
            input_shape: (1, 3, height as usize, width as usize),
            output_shape: (1, 1, height as usize, width as usize),
        })
    }

    #[must_use]
    pub fn get_preprocessing_config(&self) -> PreprocessingConfig {
        self.kind.preprocessing_config()
    }
}
