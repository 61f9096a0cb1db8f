//! Background removal processor
//!
//! Owns the inference backend and runs the full pipeline: decode, preprocess,
//! infer, build the mask, cut out the foreground and encode the PNG result.

use crate::{
    config::RemovalConfig,
    error::{BgRemovalError, Result},
    inference::InferenceBackend,
    models::ModelManager,
    services::ImageIOService,
    tracing_config::spans,
    types::{ProcessingTimings, SegmentationMask},
    utils::ImagePreprocessor,
};
use image::{DynamicImage, RgbaImage};
use instant::Instant;
use std::fmt;
use std::str::FromStr;

/// Backend type enumeration for runtime selection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendType {
    /// ONNX Runtime backend (supports GPU acceleration)
    Onnx,
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
}

impl Default for BackendType {
    /// First backend compiled into this build
    fn default() -> Self {
        if cfg!(feature = "onnx") || !cfg!(feature = "tract") {
            Self::Onnx
        } else {
            Self::Tract
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Onnx => write!(f, "onnx"),
            Self::Tract => write!(f, "tract"),
        }
    }
}

impl FromStr for BackendType {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "onnx" => Ok(Self::Onnx),
            "tract" => Ok(Self::Tract),
            _ => Err(BgRemovalError::config_value_error(
                "backend",
                s,
                "'onnx' or 'tract'",
            )),
        }
    }
}

/// Factory trait for creating inference backends
pub trait BackendFactory: Send + Sync {
    /// Create a backend instance of the specified type with the given model manager
    ///
    /// # Errors
    /// - Backend type not compiled into this build
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>>;

    /// List available backend types
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Factory for the backends enabled through cargo features
#[derive(Debug, Default)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>> {
        match backend_type {
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Box::new(crate::backends::OnnxBackend::with_model_manager(
                model_manager,
            ))),
            #[cfg(not(feature = "onnx"))]
            BackendType::Onnx => {
                drop(model_manager);
                Err(BgRemovalError::invalid_config(
                    "ONNX backend is not available in this build (enable the `onnx` feature)",
                ))
            },
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(
                crate::backends::TractBackend::with_model_manager(model_manager),
            )),
            #[cfg(not(feature = "tract"))]
            BackendType::Tract => {
                drop(model_manager);
                Err(BgRemovalError::invalid_config(
                    "Tract backend is not available in this build (enable the `tract` feature)",
                ))
            },
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        let mut backends = Vec::new();
        if cfg!(feature = "onnx") {
            backends.push(BackendType::Onnx);
        }
        if cfg!(feature = "tract") {
            backends.push(BackendType::Tract);
        }
        backends
    }
}

/// Background removal processor
///
/// The backend is created and the model loaded on first use, so inputs that
/// fail to decode never touch the model cache or the network.
pub struct BackgroundRemovalProcessor {
    config: RemovalConfig,
    backend_factory: Box<dyn BackendFactory>,
    backend: Option<Box<dyn InferenceBackend>>,
    initialized: bool,
}

impl BackgroundRemovalProcessor {
    /// Create a processor using the compiled-in backends
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn new(config: RemovalConfig) -> Result<Self> {
        Self::with_factory(config, Box::new(DefaultBackendFactory))
    }

    /// Create a processor with a custom backend factory
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_factory(
        config: RemovalConfig,
        backend_factory: Box<dyn BackendFactory>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            backend_factory,
            backend: None,
            initialized: false,
        })
    }

    /// Create a processor around an already constructed backend
    ///
    /// The model manager lookup is skipped; the backend is still initialized
    /// lazily with this configuration.
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_backend(config: RemovalConfig, backend: Box<dyn InferenceBackend>) -> Result<Self> {
        let mut processor = Self::with_factory(config, Box::new(DefaultBackendFactory))?;
        processor.backend = Some(backend);
        Ok(processor)
    }

    #[must_use]
    pub fn config(&self) -> &RemovalConfig {
        &self.config
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Resolve the model and initialize the backend
    ///
    /// Returns the model load time on the first call and `None` afterwards.
    ///
    /// # Errors
    /// - Model missing and cannot be downloaded
    /// - Backend not available or failing to load the model
    pub fn initialize(&mut self) -> Result<Option<instant::Duration>> {
        if self.initialized {
            return Ok(None);
        }

        tracing::debug!(
            model = %self.config.model,
            backend = %self.config.backend,
            execution_provider = %self.config.execution_provider,
            "Initializing background removal processor"
        );

        if self.backend.is_none() {
            let model_manager = ModelManager::for_config(&self.config)?;
            self.backend = Some(
                self.backend_factory
                    .create_backend(self.config.backend, model_manager)?,
            );
        }

        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| BgRemovalError::internal("Backend was not created"))?;
        let model_load_time = backend.initialize(&self.config)?;
        self.initialized = true;

        match backend.get_model_info() {
            Ok(info) => tracing::info!(
                model = %info.name,
                size_bytes = info.size_bytes,
                input_shape = ?info.input_shape,
                output_shape = ?info.output_shape,
                backend = %self.config.backend,
                "Background removal processor initialized"
            ),
            Err(e) => tracing::debug!(error = %e, "Model metadata unavailable"),
        }
        Ok(model_load_time)
    }

    /// Remove the background from an encoded image and return PNG bytes
    ///
    /// # Errors
    /// - Input is not a decodable image
    /// - Model or inference failures
    /// - PNG encoding failure
    pub fn process_bytes(&mut self, image_bytes: &[u8]) -> Result<Vec<u8>> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::default();

        let decode_start = Instant::now();
        let image = ImageIOService::decode_image(image_bytes)?;
        timings.decode_ms = elapsed_ms(decode_start);

        let cutout = self.remove_background(&image, &mut timings)?;

        let encode_start = Instant::now();
        let png = ImageIOService::encode_png(&cutout)?;
        timings.encode_ms = elapsed_ms(encode_start);
        timings.total_ms = elapsed_ms(total_start);

        tracing::debug!(?timings, output_bytes = png.len(), "Processing complete");
        Ok(png)
    }

    /// Remove the background from a decoded image
    ///
    /// # Errors
    /// - Model or inference failures
    pub fn process_image(&mut self, image: &DynamicImage) -> Result<RgbaImage> {
        let mut timings = ProcessingTimings::default();
        self.remove_background(image, &mut timings)
    }

    /// Compute the foreground mask at the image's own size
    ///
    /// # Errors
    /// - Model or inference failures
    pub fn segment(&mut self, image: &DynamicImage) -> Result<SegmentationMask> {
        let mut timings = ProcessingTimings::default();
        self.segment_with_timings(image, &mut timings)
    }

    fn remove_background(
        &mut self,
        image: &DynamicImage,
        timings: &mut ProcessingTimings,
    ) -> Result<RgbaImage> {
        let mask = self.segment_with_timings(image, timings)?;

        let start = Instant::now();
        let cutout = {
            let _span = spans::postprocessing("cutout").entered();
            mask.apply_to_image(image)?
        };
        timings.postprocessing_ms += elapsed_ms(start);

        tracing::debug!(
            foreground_ratio = %format!("{:.3}", mask.foreground_ratio()),
            "Background removed"
        );
        Ok(cutout)
    }

    fn segment_with_timings(
        &mut self,
        image: &DynamicImage,
        timings: &mut ProcessingTimings,
    ) -> Result<SegmentationMask> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(BgRemovalError::processing(format!(
                "Input image has no pixels ({width}x{height})"
            )));
        }

        if let Some(model_load_time) = self.initialize()? {
            timings.model_load_ms = u64::try_from(model_load_time.as_millis()).unwrap_or(u64::MAX);
        }

        let model_name = self.config.model.name();
        let backend_name = self.config.backend.to_string();
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| BgRemovalError::internal("Backend not initialized"))?;
        let preprocessing_config = backend.get_preprocessing_config()?;

        let start = Instant::now();
        let input_tensor = {
            let [target_width, target_height] = preprocessing_config.target_size;
            let _span =
                spans::preprocessing((width, height), (target_width, target_height)).entered();
            ImagePreprocessor::preprocess_image(image, &preprocessing_config)?
        };
        timings.preprocessing_ms = elapsed_ms(start);

        let expected_shape = backend.input_shape();
        if input_tensor.dim() != expected_shape {
            return Err(BgRemovalError::processing(format!(
                "Preprocessed tensor {:?} does not match model input {:?}",
                input_tensor.dim(),
                expected_shape
            )));
        }

        let start = Instant::now();
        let output_tensor = {
            let _span = spans::inference(model_name, &backend_name).entered();
            backend.infer(&input_tensor)?
        };
        timings.inference_ms = elapsed_ms(start);

        let start = Instant::now();
        let mask = {
            let _span = spans::postprocessing("mask").entered();
            SegmentationMask::from_tensor(&output_tensor)?.resize(width, height)?
        };
        timings.postprocessing_ms = elapsed_ms(start);

        Ok(mask)
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::{MockBackend, MockMask};
    use crate::models::ModelKind;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn processor_with(backend: MockBackend) -> BackgroundRemovalProcessor {
        BackgroundRemovalProcessor::with_backend(RemovalConfig::default(), Box::new(backend))
            .unwrap()
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 160, 30])));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_backend_type_parse_and_display() {
        assert_eq!("onnx".parse::<BackendType>().unwrap(), BackendType::Onnx);
        assert_eq!(" Tract ".parse::<BackendType>().unwrap(), BackendType::Tract);
        assert_eq!(BackendType::Tract.to_string(), "tract");

        let err = "openvino".parse::<BackendType>().unwrap_err();
        assert!(err.to_string().contains("openvino"));
    }

    #[test]
    fn test_default_backend_is_available() {
        let factory = DefaultBackendFactory;
        assert!(factory
            .available_backends()
            .contains(&BackendType::default()));
    }

    #[cfg(feature = "tract")]
    #[test]
    fn test_default_factory_creates_uninitialized_tract_backend() {
        let manager = ModelManager::from_path(ModelKind::U2netp, "/nonexistent/u2netp.onnx");
        let backend = DefaultBackendFactory
            .create_backend(BackendType::Tract, manager)
            .unwrap();
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_process_image_preserves_dimensions() {
        let mut processor = processor_with(MockBackend::new(MockMask::CenterDisc));
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 30, Rgb([200, 100, 50])));

        let cutout = processor.process_image(&image).unwrap();
        assert_eq!(cutout.dimensions(), (40, 30));
        assert_eq!(cutout.get_pixel(20, 15).0, [200, 100, 50, 255]);
        assert_eq!(cutout.get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_mask_is_stretched_back_to_original_aspect() {
        let mut processor = processor_with(MockBackend::new(MockMask::LeftHalf));
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 10, Rgb([255, 255, 255])));

        let mask = processor.segment(&image).unwrap();
        assert_eq!(mask.dimensions, (100, 10));
        assert_eq!(mask.data[5 * 100 + 10], 255);
        assert_eq!(mask.data[5 * 100 + 90], 0);
    }

    #[test]
    fn test_constant_prediction_gives_transparent_output() {
        let mut processor = processor_with(MockBackend::new(MockMask::Constant(0.8)));
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([10, 20, 30])));

        let cutout = processor.process_image(&image).unwrap();
        assert!(cutout.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn test_process_bytes_returns_png_of_same_size() {
        let mut processor = processor_with(MockBackend::new(MockMask::CenterDisc));

        let output = processor.process_bytes(&png_bytes(33, 21)).unwrap();
        assert_eq!(image::guess_format(&output).unwrap(), ImageFormat::Png);

        let decoded = image::load_from_memory(&output).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (33, 21));
        assert!(decoded.color().has_alpha());
    }

    #[test]
    fn test_invalid_bytes_fail_before_model_is_touched() {
        let backend = MockBackend::new(MockMask::CenterDisc);
        let history = backend.call_history_handle();
        let mut processor = processor_with(backend);

        let err = processor.process_bytes(b"not an image at all").unwrap_err();
        assert!(matches!(err, BgRemovalError::Image(_)));
        assert!(history.lock().unwrap().is_empty());
        assert!(!processor.is_initialized());
    }

    #[test]
    fn test_backend_initialized_once_across_runs() {
        let backend = MockBackend::new(MockMask::CenterDisc);
        let history = backend.call_history_handle();
        let mut processor = processor_with(backend);

        processor.process_bytes(&png_bytes(12, 12)).unwrap();
        processor.process_bytes(&png_bytes(16, 9)).unwrap();

        assert_eq!(
            *history.lock().unwrap(),
            vec!["initialize", "infer", "infer"]
        );
    }

    #[test]
    fn test_input_shape_mismatch_is_rejected_before_inference() {
        let backend = MockBackend::new(MockMask::CenterDisc).with_input_shape((1, 3, 1024, 1024));
        let history = backend.call_history_handle();
        let mut processor = processor_with(backend);

        let err = processor.process_bytes(&png_bytes(8, 8)).unwrap_err();
        assert!(matches!(err, BgRemovalError::Processing(_)));
        assert!(err.to_string().contains("1024"));
        assert_eq!(*history.lock().unwrap(), vec!["initialize"]);
    }

    #[test]
    fn test_initialization_failure_propagates() {
        let mut processor = processor_with(MockBackend::new_failing_init());

        let err = processor.process_bytes(&png_bytes(4, 4)).unwrap_err();
        assert!(matches!(err, BgRemovalError::Model(_)));
        assert!(!processor.is_initialized());
    }

    #[test]
    fn test_inference_failure_propagates() {
        let mut processor = processor_with(MockBackend::new_failing_inference());

        let err = processor.process_bytes(&png_bytes(4, 4)).unwrap_err();
        assert!(matches!(err, BgRemovalError::Inference(_)));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = RemovalConfig {
            model_sha256: Some("xyz".to_string()),
            ..RemovalConfig::default()
        };
        let result =
            BackgroundRemovalProcessor::with_backend(config, Box::new(MockBackend::new(MockMask::CenterDisc)));
        assert!(result.is_err());
    }

    #[test]
    fn test_offline_without_cached_model_fails_on_first_image() {
        let cache_dir = tempfile::tempdir().unwrap();
        let config = RemovalConfig::builder()
            .model(ModelKind::U2netp)
            .model_home(cache_dir.path())
            .offline(true)
            .build()
            .unwrap();
        let mut processor = BackgroundRemovalProcessor::new(config).unwrap();

        let err = processor.process_bytes(&png_bytes(4, 4)).unwrap_err();
        assert!(matches!(err, BgRemovalError::Model(_)));
        assert!(err.to_string().contains("u2netp.onnx"));
    }
}
