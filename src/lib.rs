#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # remove-bg
//!
//! Background removal for single images using U²-Net family segmentation
//! models, run through ONNX Runtime or Tract.
//!
//! The encoded input is decoded, stretched to the model's square input,
//! segmented, and the predicted mask is stretched back and applied to every
//! channel. The result is always a PNG with a transparent background.
//!
//! ## Features
//!
//! - **Models**: `u2net`, `u2netp`, `silueta` and `isnet-general-use`,
//!   downloaded on first use into `~/.u2net` (or `$U2NET_HOME`)
//! - **Backends**: ONNX Runtime (CUDA and `CoreML` execution providers) and
//!   Tract (pure Rust)
//! - **Formats**: JPEG, PNG, BMP, TIFF, GIF and WebP input; PNG output
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use remove_bg::{remove_background, RemovalConfig};
//!
//! let input = std::fs::read("input.jpg")?;
//! let config = RemovalConfig::from_env()?;
//! let png = remove_background(&input, &config)?;
//! std::fs::write("output.png", png)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend
//! - `tract` (default): pure Rust backend
//! - `cli` (default): the `remove-bg` binary and its log subscriber
//! - `webp-support` (default): WebP input
//!
//! ## Custom backends
//!
//! Anything implementing [`InferenceBackend`] can drive the pipeline through
//! [`BackgroundRemovalProcessor::with_backend`].

pub mod backends;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod inference;
pub mod models;
pub mod processor;
pub mod services;
pub mod tracing_config;
pub mod types;
pub mod utils;

// Public API exports
pub use backends::*;
pub use cache::ModelCache;
pub use config::{ExecutionProvider, RemovalConfig, RemovalConfigBuilder};
pub use download::ModelDownloader;
pub use error::{BgRemovalError, Result};
pub use inference::InferenceBackend;
pub use models::{ModelInfo, ModelKind, ModelManager, PreprocessingConfig};
pub use processor::{BackendFactory, BackendType, BackgroundRemovalProcessor, DefaultBackendFactory};
pub use services::ImageIOService;
pub use types::{ProcessingTimings, SegmentationMask};
pub use utils::ImagePreprocessor;

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig};

/// Remove the background from an encoded image
///
/// Accepts any format the `image` crate can detect from content and returns
/// PNG bytes of the same pixel dimensions with the background transparent.
///
/// # Errors
/// - The bytes are not a decodable image
/// - The model is missing and cannot be downloaded
/// - Backend or inference failures
pub fn remove_background(image_bytes: &[u8], config: &RemovalConfig) -> Result<Vec<u8>> {
    let mut processor = BackgroundRemovalProcessor::new(config.clone())?;
    processor.process_bytes(image_bytes)
}
