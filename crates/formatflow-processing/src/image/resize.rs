//! Target size computation and resampling
//!
//! Bounds only ever shrink an image; it is resampled once, with Lanczos3, and
//! only when the size actually changes.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

/// Compute output dimensions under optional max-width/max-height bounds,
/// preserving aspect ratio.
///
/// The width bound is applied first, then the height bound against the
/// possibly already-scaled height, so both bounds hold when both are set.
/// Sizes are carried as floats between the two passes and rounded once at the
/// end, never below 1.
pub fn target_dimensions(
    width: u32,
    height: u32,
    max_width: Option<u32>,
    max_height: Option<u32>,
) -> (u32, u32) {
    let mut w = width as f64;
    let mut h = height as f64;

    if let Some(max_w) = max_width {
        let max_w = max_w as f64;
        if w > max_w {
            h = h * max_w / w;
            w = max_w;
        }
    }

    if let Some(max_h) = max_height {
        let max_h = max_h as f64;
        if h > max_h {
            w = w * max_h / h;
            h = max_h;
        }
    }

    (round_dimension(w), round_dimension(h))
}

fn round_dimension(value: f64) -> u32 {
    (value.round() as u32).max(1)
}

/// Image resize operations
pub struct ImageResize;

impl ImageResize {
    /// Highest quality resampling filter available.
    pub const FILTER: FilterType = FilterType::Lanczos3;

    /// Render `img` at exactly `width` x `height`. Returns the input untouched
    /// when the size already matches.
    pub fn render(img: DynamicImage, width: u32, height: u32) -> DynamicImage {
        if img.dimensions() == (width, height) {
            return img;
        }
        img.resize_exact(width, height, Self::FILTER)
    }
}
