//! Tract backend implementation
//!
//! Pure Rust inference through Tract. Slower than ONNX Runtime but needs no
//! native library, which makes it the fallback when the ONNX feature is off.

use crate::config::RemovalConfig;
use crate::error::{BgRemovalError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use crate::tracing_config::spans;
use instant::{Duration, Instant};
use ndarray::Array4;
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract backend for running background removal models using pure Rust inference
#[derive(Debug)]
pub struct TractBackend {
    model: Option<TractModel>,
    model_manager: Option<ModelManager>,
    initialized: bool,
}

impl TractBackend {
    /// Create a new uninitialized Tract backend
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: None,
            model_manager: None,
            initialized: false,
        }
    }

    /// Create a Tract backend with a pre-configured model manager
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            model: None,
            model_manager: Some(model_manager),
            initialized: false,
        }
    }

    /// Load and optimize the model with a fixed input shape
    fn load_model(&mut self) -> Result<Duration> {
        let model_load_start = Instant::now();

        let Some(ref model_manager) = self.model_manager else {
            return Err(BgRemovalError::model(
                "No model manager available for Tract backend",
            ));
        };

        let model_info = model_manager.get_info()?;
        let _span = spans::model_loading(&model_info.name, "tract").entered();
        let model_data = model_manager.load_model()?;
        let (batch, channels, height, width) = model_info.input_shape;

        tracing::debug!("Creating Tract model from ONNX data");

        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| BgRemovalError::model(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([batch, channels, height, width]).into())
            .map_err(|e| BgRemovalError::model(format!("Failed to set input shape: {e}")))?
            .into_optimized()
            .map_err(|e| BgRemovalError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| {
                BgRemovalError::model(format!("Failed to create runnable model: {e}"))
            })?;

        self.model = Some(model);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        tracing::info!(
            "Tract backend initialized in {:.2}ms",
            model_load_time.as_secs_f64() * 1000.0
        );

        Ok(model_load_time)
    }
}

impl Default for TractBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, _config: &RemovalConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model()?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| BgRemovalError::internal("Tract model not initialized"))?;

        tracing::debug!("Running Tract inference with input shape: {:?}", input.shape());
        let inference_start = Instant::now();

        let input_tensor = Tensor::from(input.clone());
        let outputs = model
            .run(tvec![input_tensor.into()])
            .map_err(|e| BgRemovalError::inference(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| BgRemovalError::inference("No output tensor found"))?
            .into_arc_tensor();

        let output_view = output_tensor.to_array_view::<f32>().map_err(|e| {
            BgRemovalError::inference(format!("Failed to convert output tensor: {e}"))
        })?;
        let output_shape = output_view.shape().to_vec();
        let result = super::reshape_output(&output_shape, output_view.iter().copied().collect());

        tracing::debug!(
            "Tract inference completed in {:.2}ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
        );

        result
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.model_manager
            .as_ref()
            .and_then(|manager| manager.get_info().ok())
            .map_or((1, 3, 320, 320), |info| info.input_shape)
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        let model_manager = self
            .model_manager
            .as_ref()
            .ok_or_else(|| BgRemovalError::internal("Model manager not initialized"))?;
        Ok(model_manager.get_preprocessing_config())
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        let model_manager = self
            .model_manager
            .as_ref()
            .ok_or_else(|| BgRemovalError::internal("Model manager not initialized"))?;
        model_manager.get_info()
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
