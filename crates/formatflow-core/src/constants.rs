//! Application-wide constants

/// Quality used when re-encoding HEIC/HEIF sources to the JPEG intermediate.
pub const HEIF_INTERMEDIATE_QUALITY: f32 = 0.8;

/// Default output quality.
pub const DEFAULT_QUALITY: f32 = 0.85;

/// Message recorded on a file whose conversion failed. The underlying cause is
/// logged, never shown.
pub const CONVERSION_FAILED_MESSAGE: &str = "Conversion failed";

/// File name of the batch archive.
pub const ARCHIVE_FILE_NAME: &str = "converted-images.zip";

/// Name of the dedicated conversion thread.
pub const WORKER_THREAD_NAME: &str = "formatflow-convert";

/// Quality bounds exposed to the presentation layer.
pub const UI_QUALITY_MIN: f32 = 0.40;
pub const UI_QUALITY_MAX: f32 = 1.00;
pub const UI_QUALITY_STEP: f32 = 0.05;

/// File extensions accepted at the input boundary.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "heic", "heif"];
