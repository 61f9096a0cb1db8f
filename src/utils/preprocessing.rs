//! Image preprocessing for segmentation models
//!
//! The image is stretched to the model's square input (aspect ratio is not
//! preserved, the mask is stretched back afterwards), scaled by its brightest
//! channel value and normalised per channel.

use crate::{
    error::{BgRemovalError, Result},
    models::PreprocessingConfig,
};
use image::{imageops, DynamicImage};
use ndarray::Array4;

/// Lower bound for the brightest value so black images do not divide by zero
const MIN_MAX_PIXEL_VALUE: f32 = 1e-6;

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Convert an image into a normalised NCHW tensor of shape `(1, 3, size, size)`
    ///
    /// # Errors
    /// - Zero target size or a zero standard deviation in the configuration
    pub fn preprocess_image(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<Array4<f32>> {
        let [target_width, target_height] = preprocessing_config.target_size;
        if target_width == 0 || target_height == 0 {
            return Err(BgRemovalError::processing(
                "Preprocessing target size must be non-zero",
            ));
        }
        if preprocessing_config.normalization_std.iter().any(|&std| std == 0.0) {
            return Err(BgRemovalError::processing(
                "Normalization standard deviation must be non-zero",
            ));
        }

        let resized = imageops::resize(
            &image.to_rgb8(),
            target_width,
            target_height,
            imageops::FilterType::Lanczos3,
        );

        let max_value = resized
            .as_raw()
            .iter()
            .copied()
            .max()
            .map_or(0.0, f32::from)
            .max(MIN_MAX_PIXEL_VALUE);

        let mean = preprocessing_config.normalization_mean;
        let std = preprocessing_config.normalization_std;
        let mut tensor =
            Array4::<f32>::zeros((1, 3, target_height as usize, target_width as usize));

        for (x, y, pixel) in resized.enumerate_pixels() {
            for (channel, (&value, (&channel_mean, &channel_std))) in
                pixel.0.iter().zip(mean.iter().zip(std.iter())).enumerate()
            {
                if let Some(slot) = tensor.get_mut([0, channel, y as usize, x as usize]) {
                    *slot = (f32::from(value) / max_value - channel_mean) / channel_std;
                }
            }
        }

        Ok(tensor)
    }
}
