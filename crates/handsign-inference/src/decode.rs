//! Image decoding into an RGB pixel grid.
//!
//! Any container the `image` crate can sniff from the byte stream is
//! accepted. EXIF orientation is applied, so the grid is upright as a viewer
//! would show it. The output channel order is always RGB regardless of how
//! the source was encoded.

use std::io::Cursor;

use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder as _, ImageReader, Limits, RgbImage};
use tracing::debug;

use crate::error::{InferenceError, InferenceResult};

/// Default upper bound on decoded width and height.
pub const DEFAULT_MAX_IMAGE_DIMENSION: u32 = 8192;

/// Decoded image in RGB channel order.
#[derive(Debug, Clone)]
pub struct PixelGrid {
    rgb: RgbImage,
}

impl PixelGrid {
    pub fn from_rgb(rgb: RgbImage) -> Self {
        Self { rgb }
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    /// Borrow the underlying RGB buffer.
    pub fn as_rgb(&self) -> &RgbImage {
        &self.rgb
    }
}

/// Decodes raw upload bytes into a [`PixelGrid`].
#[derive(Debug, Clone, Copy)]
pub struct ImageDecoder {
    max_dimension: u32,
}

impl Default for ImageDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IMAGE_DIMENSION)
    }
}

impl ImageDecoder {
    pub fn new(max_dimension: u32) -> Self {
        Self { max_dimension }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Decode bytes into an RGB grid.
    ///
    /// Every failure (empty buffer, unknown format, corrupt or truncated
    /// data, oversized header) is reported as [`InferenceError::InvalidImage`].
    pub fn decode(&self, bytes: &[u8]) -> InferenceResult<PixelGrid> {
        if bytes.is_empty() {
            return Err(InferenceError::invalid_image("empty buffer"));
        }

        let mut reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| InferenceError::invalid_image(format!("format probe failed: {e}")))?;

        let format = reader
            .format()
            .ok_or_else(|| InferenceError::invalid_image("unrecognized image format"))?;

        let mut limits = Limits::default();
        limits.max_image_width = Some(self.max_dimension);
        limits.max_image_height = Some(self.max_dimension);
        reader.limits(limits);

        let mut decoder = reader
            .into_decoder()
            .map_err(|e| InferenceError::invalid_image(e.to_string()))?;

        // Unreadable EXIF leaves the pixels as stored
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

        let mut image = DynamicImage::from_decoder(decoder)
            .map_err(|e| InferenceError::invalid_image(e.to_string()))?;
        image.apply_orientation(orientation);

        let rgb = image.to_rgb8();
        if rgb.width() == 0 || rgb.height() == 0 {
            return Err(InferenceError::invalid_image("image has no pixels"));
        }

        debug!(
            format = ?format,
            orientation = ?orientation,
            width = rgb.width(),
            height = rgb.height(),
            "Image decoded"
        );

        Ok(PixelGrid::from_rgb(rgb))
    }
}

/// Decode with the default limits.
pub fn decode_image(bytes: &[u8]) -> InferenceResult<PixelGrid> {
    ImageDecoder::default().decode(bytes)
}
