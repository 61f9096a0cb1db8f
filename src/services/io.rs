//! Image I/O operations service
//!
//! Keeps file system access and image codecs out of the processing pipeline.

use crate::error::{BgRemovalError, Result};
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader, RgbaImage};
use std::io::{Cursor, Write};
use std::path::Path;

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Read the whole input file as opaque bytes
    ///
    /// # Errors
    /// - The file is missing or unreadable
    pub fn read_input<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
        let path_ref = path.as_ref();
        let bytes = std::fs::read(path_ref)
            .map_err(|e| BgRemovalError::file_io_error("read input image", path_ref, &e))?;

        tracing::debug!(
            path = %path_ref.display(),
            size_bytes = bytes.len(),
            "Read input image"
        );
        Ok(bytes)
    }

    /// Write bytes to `path`, creating or replacing the file
    ///
    /// The bytes go to a temporary file next to the destination which is synced
    /// and then renamed over it, so a failed write never leaves a truncated
    /// output behind.
    ///
    /// # Errors
    /// - The destination directory is missing or not writable
    pub fn write_output<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
        let path_ref = path.as_ref();
        let directory = path_ref
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut temp_file = tempfile::Builder::new()
            .prefix(".remove-bg-")
            .suffix(".tmp")
            .tempfile_in(directory)
            .map_err(|e| BgRemovalError::file_io_error("create output file", path_ref, &e))?;

        temp_file
            .write_all(bytes)
            .and_then(|()| temp_file.as_file().sync_all())
            .map_err(|e| BgRemovalError::file_io_error("write output image", path_ref, &e))?;

        temp_file
            .persist(path_ref)
            .map_err(|e| BgRemovalError::file_io_error("write output image", path_ref, &e.error))?;

        tracing::debug!(
            path = %path_ref.display(),
            size_bytes = bytes.len(),
            "Wrote output image"
        );
        Ok(())
    }

    /// Decode an encoded image, detecting the format from its content
    ///
    /// EXIF orientation is applied so the pixels match what viewers display.
    ///
    /// # Errors
    /// - Unknown or unsupported format, or corrupt image data
    pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
        let mut decoder = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .into_decoder()?;
        let orientation = decoder.orientation()?;

        let mut image = DynamicImage::from_decoder(decoder)?;
        image.apply_orientation(orientation);

        tracing::debug!(
            width = image.width(),
            height = image.height(),
            color = ?image.color(),
            "Decoded input image"
        );
        Ok(image)
    }

    /// Encode an RGBA image as PNG
    ///
    /// # Errors
    /// - PNG encoding failure
    pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }
}
