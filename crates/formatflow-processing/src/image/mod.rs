//! Image processing module
//!
//! This module provides the raster stages of the conversion pipeline:
//! - Decoding encoded bytes into a pixel surface (decode)
//! - Target size computation and resampling (resize)

pub mod decode;
pub mod resize;

pub use decode::{DecodePath, DecodedImage, ImageDecoder};
pub use resize::{target_dimensions, ImageResize};
