//! Core types for background removal operations

use crate::error::{BgRemovalError, Result};
use image::{imageops, DynamicImage, GrayImage, RgbaImage};
use ndarray::{s, Array4};

/// 8-bit foreground mask, 255 = foreground
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationMask {
    /// Row-major mask values
    pub data: Vec<u8>,
    /// `(width, height)`
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    /// # Errors
    /// - `data` length does not match the dimensions
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Result<Self> {
        let expected = dimensions.0 as usize * dimensions.1 as usize;
        if data.len() != expected {
            return Err(BgRemovalError::processing(format!(
                "Mask data has {} values, expected {} for {}x{}",
                data.len(),
                expected,
                dimensions.0,
                dimensions.1
            )));
        }
        Ok(Self { data, dimensions })
    }

    /// Build a mask from the first channel of a model output
    ///
    /// Values are min-max normalised over the whole prediction; a constant
    /// prediction yields an all-background mask.
    ///
    /// # Errors
    /// - Empty output tensor
    pub fn from_tensor(output: &Array4<f32>) -> Result<Self> {
        let (batch, channels, height, width) = output.dim();
        if batch == 0 || channels == 0 || height == 0 || width == 0 {
            return Err(BgRemovalError::processing(format!(
                "Model output tensor is empty: {:?}",
                output.dim()
            )));
        }

        let prediction = output.slice(s![0, 0, .., ..]);
        let (min, max) = prediction
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), &v| {
                (min.min(v), max.max(v))
            });
        let range = max - min;

        let data = prediction
            .iter()
            .map(|&value| {
                let normalized = if range > 0.0 && range.is_finite() {
                    (value - min) / range
                } else {
                    0.0
                };
                // Truncate like a float-to-u8 cast of the scaled prediction
                (normalized * 255.0).clamp(0.0, 255.0) as u8
            })
            .collect();

        Self::new(data, (width as u32, height as u32))
    }

    /// Resize with Lanczos3 filtering
    ///
    /// # Errors
    /// - Mask buffer inconsistent with its dimensions
    pub fn resize(&self, width: u32, height: u32) -> Result<Self> {
        if self.dimensions == (width, height) {
            return Ok(self.clone());
        }

        let resized = imageops::resize(
            &self.to_gray_image()?,
            width,
            height,
            imageops::FilterType::Lanczos3,
        );
        Self::new(resized.into_raw(), (width, height))
    }

    /// # Errors
    /// - Mask buffer inconsistent with its dimensions
    pub fn to_gray_image(&self) -> Result<GrayImage> {
        GrayImage::from_raw(self.dimensions.0, self.dimensions.1, self.data.clone())
            .ok_or_else(|| BgRemovalError::internal("Mask buffer does not match its dimensions"))
    }

    /// Composite the image over a fully transparent canvas using the mask
    ///
    /// Every RGBA channel is scaled by `mask / 255`, so background pixels become
    /// transparent black.
    ///
    /// # Errors
    /// - Image and mask dimensions differ
    pub fn apply_to_image(&self, image: &DynamicImage) -> Result<RgbaImage> {
        let (width, height) = (image.width(), image.height());
        if (width, height) != self.dimensions {
            return Err(BgRemovalError::processing(format!(
                "Mask is {}x{} but image is {}x{}",
                self.dimensions.0, self.dimensions.1, width, height
            )));
        }

        let mut rgba = image.to_rgba8();
        for (pixel, &alpha) in rgba.pixels_mut().zip(self.data.iter()) {
            let alpha = u32::from(alpha);
            for channel in &mut pixel.0 {
                *channel = ((u32::from(*channel) * alpha + 127) / 255) as u8;
            }
        }
        Ok(rgba)
    }

    /// Fraction of pixels that are at least half foreground
    #[must_use]
    pub fn foreground_ratio(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let foreground = self.data.iter().filter(|&&v| v >= 128).count();
        foreground as f32 / self.data.len() as f32
    }
}

/// Per-stage timings of a processing run, in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingTimings {
    pub decode_ms: u64,
    pub model_load_ms: u64,
    pub preprocessing_ms: u64,
    pub inference_ms: u64,
    pub postprocessing_ms: u64,
    pub encode_ms: u64,
    pub total_ms: u64,
}
