//! Backend implementations for different inference engines
//!
//! - ONNX Runtime backend (GPU acceleration through execution providers)
//! - Tract backend (pure Rust, no external dependencies)

use crate::error::{BgRemovalError, Result};
use ndarray::Array4;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

// Test utilities for backend testing
#[cfg(test)]
pub mod test_utils;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;

/// Turn a flat model output into an NCHW array
///
/// Segmentation models emit `(1, 1, H, W)`; anything that is not 4D is an error.
#[allow(dead_code)] // unused when no backend feature is enabled
pub(crate) fn reshape_output(shape: &[usize], data: Vec<f32>) -> Result<Array4<f32>> {
    let &[batch, channels, height, width] = shape else {
        return Err(BgRemovalError::inference(format!(
            "Expected 4D output tensor, got {}D",
            shape.len()
        )));
    };

    Array4::from_shape_vec((batch, channels, height, width), data).map_err(|e| {
        BgRemovalError::inference(format!("Failed to reshape output tensor: {e}"))
    })
}
