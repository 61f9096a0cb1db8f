//! Inference backend abstraction

use crate::{
    config::RemovalConfig,
    error::Result,
    models::{ModelInfo, PreprocessingConfig},
};
use ndarray::Array4;

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// Trait for inference backends
pub trait InferenceBackend {
    /// Initialize the backend with the given configuration
    ///
    /// Returns the model load time, or `None` if the backend was already
    /// initialized.
    ///
    /// # Errors
    /// - Backend initialization failures
    /// - Model loading or validation errors
    fn initialize(&mut self, config: &RemovalConfig) -> Result<Option<Duration>>;

    /// Run inference on an NCHW input tensor and return the first output
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures
    /// - Output is not a 4D tensor
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Expected input shape (NCHW)
    fn input_shape(&self) -> (usize, usize, usize, usize);

    /// # Errors
    /// - Model manager not available
    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig>;

    /// # Errors
    /// - Model manager not available
    /// - Model metadata unavailable
    fn get_model_info(&self) -> Result<ModelInfo>;

    fn is_initialized(&self) -> bool;
}
