//! Error types module
//!
//! `ConversionError` covers everything that can go wrong while converting a
//! single file. Every variant is fatal for that file only; callers converting a
//! batch keep going with the next file.

/// Per-file conversion failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    #[error("Normalization failed: {0}")]
    NormalizationFailed(String),

    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    #[error("Encode failed: {0}")]
    EncodeFailed(String),

    #[error("Invalid conversion options: {0}")]
    InvalidOptions(String),

    #[error("Conversion cancelled")]
    Cancelled,
}

impl ConversionError {
    /// Machine-readable error code (e.g., "DECODE_FAILED")
    pub fn error_code(&self) -> &'static str {
        match self {
            ConversionError::NormalizationFailed(_) => "NORMALIZATION_FAILED",
            ConversionError::DecodeFailed(_) => "DECODE_FAILED",
            ConversionError::EncodeFailed(_) => "ENCODE_FAILED",
            ConversionError::InvalidOptions(_) => "INVALID_OPTIONS",
            ConversionError::Cancelled => "CANCELLED",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConversionError::Cancelled)
    }
}
