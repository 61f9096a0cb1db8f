//! ONNX Runtime backend implementation
//!
//! Runs the segmentation model through ONNX Runtime with CPU, CUDA or `CoreML`
//! execution providers.

use crate::config::{ExecutionProvider, RemovalConfig};
use crate::error::{BgRemovalError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use crate::tracing_config::spans;
use instant::{Duration, Instant};
use ndarray::Array4;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
};
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::value::Value;

/// ONNX Runtime backend for running background removal models
#[derive(Debug)]
pub struct OnnxBackend {
    session: Option<Session>,
    model_manager: Option<ModelManager>,
    initialized: bool,
}

impl OnnxBackend {
    /// Create an uninitialized backend without a model
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: None,
            model_manager: None,
            initialized: false,
        }
    }

    /// Create a new ONNX backend with specific model manager
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            session: None,
            model_manager: Some(model_manager),
            initialized: false,
        }
    }

    /// Register the execution providers requested by the configuration
    ///
    /// Providers that are not available fall back to CPU with a warning.
    fn configure_execution_providers(
        session_builder: SessionBuilder,
        provider: ExecutionProvider,
    ) -> Result<SessionBuilder> {
        let cuda_available =
            || OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
        let coreml_available = || {
            OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default()).unwrap_or(false)
        };

        let mut providers = Vec::new();
        match provider {
            ExecutionProvider::Auto => {
                if cuda_available() {
                    tracing::debug!("CUDA execution provider is available and will be used");
                    providers.push(CUDAExecutionProvider::default().build());
                }
                if coreml_available() {
                    tracing::debug!("CoreML execution provider is available and will be used");
                    providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
                }
            },
            ExecutionProvider::Cpu => {},
            ExecutionProvider::Cuda => {
                if cuda_available() {
                    providers.push(CUDAExecutionProvider::default().build());
                } else {
                    tracing::warn!(
                        "CUDA execution provider requested but not available, falling back to CPU"
                    );
                }
            },
            ExecutionProvider::CoreMl => {
                if coreml_available() {
                    providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
                } else {
                    tracing::warn!(
                        "CoreML execution provider requested but not available, falling back to CPU"
                    );
                }
            },
        }

        if providers.is_empty() {
            tracing::debug!("Using CPU execution provider");
            return Ok(session_builder);
        }

        session_builder
            .with_execution_providers(providers)
            .map_err(|e| {
                BgRemovalError::inference(format!(
                    "Failed to set {provider} execution providers: {e}"
                ))
            })
    }

    /// Load and initialize the ONNX model
    fn load_model(&mut self, config: &RemovalConfig) -> Result<Duration> {
        let model_load_start = Instant::now();

        let model_manager = self.model_manager.as_ref().ok_or_else(|| {
            BgRemovalError::internal("No model manager available for ONNX backend")
        })?;
        let model_info = model_manager.get_info()?;
        let _span = spans::model_loading(&model_info.name, &config.execution_provider.to_string())
            .entered();

        let model_data = model_manager.load_model()?;

        let session_builder = Session::builder()
            .map_err(|e| {
                BgRemovalError::inference(format!("Failed to create session builder: {e}"))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                BgRemovalError::inference(format!("Failed to set optimization level: {e}"))
            })?;
        let session_builder =
            Self::configure_execution_providers(session_builder, config.execution_provider)?;

        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(4)
        };

        let session = session_builder
            .with_intra_threads(intra_threads)
            .map_err(|e| BgRemovalError::inference(format!("Failed to set intra threads: {e}")))?
            .commit_from_memory(&model_data)
            .map_err(|e| {
                BgRemovalError::model_error_with_context(
                    "load",
                    model_manager.model_path(),
                    &e.to_string(),
                    &["delete the file so it is downloaded again"],
                )
            })?;

        let size_mb = model_info.size_bytes as f64 / (1024.0 * 1024.0);
        tracing::debug!(
            model = %model_info.name,
            size_mb = %format!("{size_mb:.2}"),
            intra_threads,
            "ONNX Runtime session created"
        );

        self.session = Some(session);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        tracing::info!(
            "Model loading complete: {:.0}ms",
            model_load_time.as_secs_f64() * 1000.0
        );

        Ok(model_load_time)
    }
}

impl Default for OnnxBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &RemovalConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(BgRemovalError::internal("Backend not initialized"));
        }

        let session = self
            .session
            .as_mut()
            .ok_or_else(|| BgRemovalError::internal("ONNX session not initialized"))?;

        let inference_start = Instant::now();
        tracing::debug!("Starting inference with input shape: {:?}", input.dim());

        let input_value = Value::from_array(input.clone()).map_err(|e| {
            BgRemovalError::processing(format!("Failed to convert input tensor: {e}"))
        })?;

        // Positional input and first output; the models disagree on tensor names
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| BgRemovalError::inference(format!("ONNX inference failed: {e}")))?;

        let keys: Vec<_> = outputs.keys().collect();
        let first_key = keys
            .first()
            .ok_or_else(|| BgRemovalError::inference("No output tensors found"))?;
        let output_tensor = outputs
            .get(first_key)
            .ok_or_else(|| BgRemovalError::inference("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| {
                BgRemovalError::inference(format!("Failed to extract output tensor: {e}"))
            })?;

        let output_shape = output_tensor.shape().to_vec();
        let output_data = output_tensor.iter().copied().collect();
        let result = super::reshape_output(&output_shape, output_data);

        tracing::debug!(
            "Inference complete: {:.2}ms",
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
