//! FormatFlow Image Processing Library
//!
//! This crate holds the single implementation of the conversion pipeline:
//! format normalization, decoding, resizing and encoding. It has no notion of
//! threads or queues; the conversion worker and inline callers both run
//! [`ConversionEngine`] directly.

pub mod compression;
pub mod engine;
pub mod image;
pub mod normalize;

// Test fixtures shared with downstream crates' tests
#[cfg(any(test, feature = "test-support"))]
pub mod test_helpers;

// Re-export commonly used types
pub use compression::ImageEncoder;
pub use engine::{ConversionEngine, NoopObserver, StageObserver};
pub use crate::image::{target_dimensions, DecodePath, DecodedImage, ImageDecoder, ImageResize};
pub use normalize::{detect_source_kind, is_heif, normalize, Normalized, SourceKind};
