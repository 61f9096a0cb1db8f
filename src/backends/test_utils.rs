//! Mock backend for testing the processing pipeline without a model file

use crate::{
    config::RemovalConfig,
    error::{BgRemovalError, Result},
    inference::InferenceBackend,
    models::{ModelInfo, ModelKind, PreprocessingConfig},
};
use instant::Duration;
use ndarray::Array4;
use std::sync::{Arc, Mutex};

/// Shape of the mask the mock backend produces
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockMask {
    /// Foreground disc centred in the frame, radius a third of the side
    CenterDisc,
    /// Same value everywhere
    Constant(f32),
    /// Left half foreground, right half background
    LeftHalf,
}

/// Mock inference backend recording its calls
#[derive(Debug, Clone)]
pub struct MockBackend {
    initialized: bool,
    kind: ModelKind,
    mask: MockMask,
    input_shape: Option<(usize, usize, usize, usize)>,
    call_history: Arc<Mutex<Vec<String>>>,
    should_fail_init: bool,
    should_fail_inference: bool,
}

impl MockBackend {
    #[must_use]
    pub fn new(mask: MockMask) -> Self {
        Self {
            initialized: false,
            kind: ModelKind::U2netp,
            mask,
            input_shape: None,
            call_history: Arc::new(Mutex::new(Vec::new())),
            should_fail_init: false,
            should_fail_inference: false,
        }
    }

    #[must_use]
    pub fn new_failing_init() -> Self {
        let mut backend = Self::new(MockMask::CenterDisc);
        backend.should_fail_init = true;
        backend
    }

    #[must_use]
    pub fn new_failing_inference() -> Self {
        let mut backend = Self::new(MockMask::CenterDisc);
        backend.should_fail_inference = true;
        backend
    }

    /// Report a fixed input shape instead of the model's own
    #[must_use]
    pub fn with_input_shape(mut self, shape: (usize, usize, usize, usize)) -> Self {
        self.input_shape = Some(shape);
        self
    }

    /// Shared handle to the call log, usable after the backend is boxed
    #[must_use]
    pub fn call_history_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.call_history)
    }

    fn record_call(&self, method: &str) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(method.to_string());
        }
    }

    fn mask_value(&self, x: usize, y: usize, width: usize, height: usize) -> f32 {
        match self.mask {
            MockMask::Constant(value) => value,
            MockMask::LeftHalf => {
                if x < width / 2 {
                    1.0
                } else {
                    0.0
                }
            },
            MockMask::CenterDisc => {
                let dx = x as f32 - width as f32 / 2.0;
                let dy = y as f32 - height as f32 / 2.0;
                let radius = width.min(height) as f32 / 3.0;
                if (dx * dx + dy * dy).sqrt() < radius {
                    1.0
                } else {
                    0.0
                }
            },
        }
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self, _config: &RemovalConfig) -> Result<Option<Duration>> {
        self.record_call("initialize");

        if self.should_fail_init {
            return Err(BgRemovalError::model("Mock backend initialization failed"));
        }
        if self.initialized {
            return Ok(None);
        }

        self.initialized = true;
        Ok(Some(Duration::from_millis(1)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.record_call("infer");

        if !self.initialized {
            return Err(BgRemovalError::internal("Backend not initialized"));
        }
        if self.should_fail_inference {
            return Err(BgRemovalError::inference("Mock inference failed"));
        }

        let (batch, _, height, width) = input.dim();
        let mut output = Array4::<f32>::zeros((batch, 1, height, width));
        for ((_, _, y, x), value) in output.indexed_iter_mut() {
            *value = self.mask_value(x, y, width, height);
        }
        Ok(output)
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        let [width, height] = self.kind.preprocessing_config().target_size;
        self.input_shape
            .unwrap_or((1, 3, height as usize, width as usize))
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.kind.preprocessing_config())
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        let (batch, _, height, width) = self.input_shape();
        Ok(ModelInfo {
            name: "mock-u2netp".to_string(),
            size_bytes: 1024 * 1024,
            input_shape: self.input_shape(),
            output_shape: (batch, 1, height, width),
        })
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_calls() {
        let mut backend = MockBackend::new(MockMask::CenterDisc);
        let history = backend.call_history_handle();

        backend.initialize(&RemovalConfig::default()).unwrap();
        backend.infer(&Array4::zeros((1, 3, 8, 8))).unwrap();

        assert_eq!(*history.lock().unwrap(), vec!["initialize", "infer"]);
    }

    #[test]
    fn test_mock_output_shape_follows_input() {
        let mut backend = MockBackend::new(MockMask::LeftHalf);
        backend.initialize(&RemovalConfig::default()).unwrap();

        let output = backend.infer(&Array4::zeros((1, 3, 4, 6))).unwrap();
        assert_eq!(output.dim(), (1, 1, 4, 6));
        assert!((output[[0, 0, 0, 0]] - 1.0).abs() < f32::EPSILON);
        assert!(output[[0, 0, 0, 5]].abs() < f32::EPSILON);
    }

    #[test]
    fn test_mock_model_info_follows_input_shape() {
        let backend = MockBackend::new(MockMask::CenterDisc).with_input_shape((1, 3, 64, 48));
        let info = backend.get_model_info().unwrap();
        assert_eq!(info.input_shape, (1, 3, 64, 48));
        assert_eq!(info.output_shape, (1, 1, 64, 48));
    }

    #[test]
    fn test_mock_failure_modes() {
        let mut failing_init = MockBackend::new_failing_init();
        assert!(failing_init.initialize(&RemovalConfig::default()).is_err());

        let mut failing_inference = MockBackend::new_failing_inference();
        failing_inference
            .initialize(&RemovalConfig::default())
            .unwrap();
        assert!(failing_inference.infer(&Array4::zeros((1, 3, 2, 2))).is_err());
    }
}
