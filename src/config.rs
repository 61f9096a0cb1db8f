//! Configuration types for background removal operations
//!
//! The command line accepts no options, so everything tunable is read from the
//! environment by [`RemovalConfig::from_env`]. Library users build the same
//! struct through [`RemovalConfig::builder`].

use crate::cache::MODEL_HOME_ENV;
use crate::error::{BgRemovalError, Result};
use crate::models::ModelKind;
use crate::processor::BackendType;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const MODEL_ENV: &str = "REMOVE_BG_MODEL";
pub const BACKEND_ENV: &str = "REMOVE_BG_BACKEND";
pub const EXECUTION_PROVIDER_ENV: &str = "REMOVE_BG_EXECUTION_PROVIDER";
pub const THREADS_ENV: &str = "REMOVE_BG_THREADS";
pub const OFFLINE_ENV: &str = "REMOVE_BG_OFFLINE";
pub const MODEL_SHA256_ENV: &str = "REMOVE_BG_MODEL_SHA256";

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

impl FromStr for ExecutionProvider {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "coreml" => Ok(Self::CoreMl),
            _ => Err(BgRemovalError::config_value_error(
                "execution provider",
                s,
                "one of: auto, cpu, cuda, coreml",
            )),
        }
    }
}

/// Configuration for a background removal run
#[derive(Debug, Clone, PartialEq)]
pub struct RemovalConfig {
    /// Segmentation model to run
    pub model: ModelKind,
    /// Inference backend
    pub backend: BackendType,
    /// Execution provider (ONNX backend only)
    pub execution_provider: ExecutionProvider,
    /// Number of intra-op threads (0 = auto)
    pub intra_threads: usize,
    /// Model cache directory override (`None` = `~/.u2net`)
    pub model_home: Option<PathBuf>,
    /// Never download missing models
    pub offline: bool,
    /// Expected lowercase hex SHA-256 of the model file
    pub model_sha256: Option<String>,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            model: ModelKind::default(),
            backend: BackendType::default(),
            execution_provider: ExecutionProvider::Auto,
            intra_threads: 0,
            model_home: None,
            offline: false,
            model_sha256: None,
        }
    }
}

impl RemovalConfig {
    #[must_use]
    pub fn builder() -> RemovalConfigBuilder {
        RemovalConfigBuilder::new()
    }

    /// Read the configuration from the process environment
    ///
    /// # Errors
    /// - Any variable holds a value that cannot be parsed
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    /// - Any looked-up value cannot be parsed
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut builder = Self::builder();

        if let Some(value) = get(MODEL_ENV) {
            builder = builder.model(value.parse()?);
        }
        if let Some(value) = get(BACKEND_ENV) {
            builder = builder.backend(value.parse()?);
        }
        if let Some(value) = get(EXECUTION_PROVIDER_ENV) {
            builder = builder.execution_provider(value.parse()?);
        }
        if let Some(value) = get(THREADS_ENV) {
            let threads = value.trim().parse::<usize>().map_err(|_| {
                BgRemovalError::config_value_error(THREADS_ENV, &value, "a non-negative integer")
            })?;
            builder = builder.intra_threads(threads);
        }
        if let Some(value) = get(MODEL_HOME_ENV) {
            builder = builder.model_home(value);
        }
        if let Some(value) = get(OFFLINE_ENV) {
            builder = builder.offline(parse_flag(OFFLINE_ENV, &value)?);
        }
        if let Some(value) = get(MODEL_SHA256_ENV) {
            builder = builder.model_sha256(value);
        }

        builder.build()
    }

    /// Validate configuration values
    ///
    /// # Errors
    /// - Model digest is not 64 hexadecimal characters
    pub fn validate(&self) -> Result<()> {
        if let Some(digest) = &self.model_sha256 {
            if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(BgRemovalError::config_value_error(
                    MODEL_SHA256_ENV,
                    digest,
                    "64 hexadecimal characters",
                ));
            }
        }
        Ok(())
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(BgRemovalError::config_value_error(
            name,
            value,
            "1/0, true/false, yes/no or on/off",
        )),
    }
}

/// Builder for `RemovalConfig`
#[derive(Debug, Default)]
pub struct RemovalConfigBuilder {
    config: RemovalConfig,
}

impl RemovalConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn model(mut self, model: ModelKind) -> Self {
        self.config.model = model;
        self
    }

    #[must_use]
    pub fn backend(mut self, backend: BackendType) -> Self {
        self.config.backend = backend;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    #[must_use]
    pub fn model_home<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.config.model_home = Some(dir.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub fn offline(mut self, offline: bool) -> Self {
        self.config.offline = offline;
        self
    }

    #[must_use]
    pub fn model_sha256<S: Into<String>>(mut self, digest: S) -> Self {
        self.config.model_sha256 = Some(digest.into().trim().to_ascii_lowercase());
        self
    }

    /// # Errors
    /// - Validation failures, see [`RemovalConfig::validate`]
    pub fn build(self) -> Result<RemovalConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
