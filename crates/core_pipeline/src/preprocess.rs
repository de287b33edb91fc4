//! Image preprocessing module
//!
//! Prepares a photographed manifest page for OCR:
//! - Decoding from encoded bytes (JPEG, PNG, ...)
//! - Grayscale conversion
//! - Edge-preserving noise reduction (bilateral filter)
//! - Adaptive (local mean) thresholding
//! - Optional median despeckle of the binary result
//!
//! Creased and stained paper produces fine texture that a plain blur either
//! keeps or smears into the character strokes; the bilateral filter only
//! averages pixels of similar intensity. A single global threshold fails on
//! pages that are half in shadow, so the cutoff follows the local mean.

use crate::config::{PreprocessConfig, MAX_FILTER_RADIUS};
use crate::error::PipelineError;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::{bilateral_filter, median_filter};
use imageproc::integral_image::{integral_image, sum_image_pixels};
use tracing::debug;

/// Decode encoded image bytes
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::Decode("empty image buffer".to_string()));
    }
    let image = image::load_from_memory(bytes)?;
    debug!(
        width = image.width(),
        height = image.height(),
        "Decoded image"
    );
    Ok(image)
}

/// Preprocess a photographed page for OCR
///
/// Output has the input's dimensions and contains only 0 (ink) and 255
/// (paper).
pub fn preprocess_image(
    input: &DynamicImage,
    config: &PreprocessConfig,
) -> Result<GrayImage, PipelineError> {
    if input.width() == 0 || input.height() == 0 {
        return Err(PipelineError::EmptyImage);
    }

    let gray = input.to_luma8();
    let smoothed = denoise(&gray, config);
    let binary = adaptive_threshold(
        &smoothed,
        config.threshold_block_radius,
        config.threshold_offset,
    );

    let output = if config.despeckle_radius > 0 {
        let radius = config.despeckle_radius.min(MAX_FILTER_RADIUS);
        median_filter(&binary, radius, radius)
    } else {
        binary
    };

    debug!(
        width = output.width(),
        height = output.height(),
        "Preprocessed image"
    );
    Ok(output)
}

/// Edge-preserving smoothing with `imageproc`'s bilateral filter
///
/// The window spans `2 * bilateral_radius + 1` pixels, with the radius capped
/// at [`MAX_FILTER_RADIUS`]. Radius 0 or a non-positive sigma returns the
/// input unchanged.
pub fn denoise(image: &GrayImage, config: &PreprocessConfig) -> GrayImage {
    if config.bilateral_radius == 0
        || config.bilateral_range_sigma <= 0.0
        || config.bilateral_spatial_sigma <= 0.0
    {
        return image.clone();
    }
    let window_size = 2 * config.bilateral_radius.min(MAX_FILTER_RADIUS) + 1;
    bilateral_filter(
        image,
        window_size,
        config.bilateral_range_sigma,
        config.bilateral_spatial_sigma,
    )
}

/// Local mean threshold
///
/// A pixel becomes white (255) when it is brighter than the mean of its
/// `(2r+1)^2` window minus `offset`, black (0) otherwise. Windows are
/// clipped at the image border. Window sums come from an integral image,
/// so the cost does not depend on `block_radius`.
pub fn adaptive_threshold(image: &GrayImage, block_radius: u32, offset: i32) -> GrayImage {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return image.clone();
    }

    let integral = integral_image::<_, u64>(image);
    GrayImage::from_fn(w, h, |x, y| {
        let left = x.saturating_sub(block_radius);
        let top = y.saturating_sub(block_radius);
        let right = x.saturating_add(block_radius).min(w - 1);
        let bottom = y.saturating_add(block_radius).min(h - 1);

        let sum = sum_image_pixels(&integral, left, top, right, bottom)[0];
        let area = u64::from(right - left + 1) * u64::from(bottom - top + 1);
        let cutoff = sum as f64 / area as f64 - f64::from(offset);

        if f64::from(image.get_pixel(x, y)[0]) > cutoff {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}
