use serde::{Deserialize, Serialize};

use super::OutputFormat;
use crate::constants::DEFAULT_QUALITY;
use crate::error::ConversionError;

/// Conversion options applied to every file of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConversionOptions {
    pub format: OutputFormat,
    /// Fraction in [0, 1]. Ignored for lossless formats.
    pub quality: f32,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpg,
            quality: DEFAULT_QUALITY,
            max_width: None,
            max_height: None,
        }
    }
}

impl ConversionOptions {
    pub fn new(format: OutputFormat, quality: f32) -> Self {
        Self {
            format,
            quality,
            max_width: None,
            max_height: None,
        }
    }

    pub fn with_max_width(mut self, max_width: u32) -> Self {
        self.max_width = Some(max_width);
        self
    }

    pub fn with_max_height(mut self, max_height: u32) -> Self {
        self.max_height = Some(max_height);
        self
    }

    pub fn validate(&self) -> Result<(), ConversionError> {
        if !(0.0..=1.0).contains(&self.quality) {
            return Err(ConversionError::InvalidOptions(format!(
                "quality must be within [0, 1], got {}",
                self.quality
            )));
        }
        if self.max_width == Some(0) {
            return Err(ConversionError::InvalidOptions(
                "max width must be positive".to_string(),
            ));
        }
        if self.max_height == Some(0) {
            return Err(ConversionError::InvalidOptions(
                "max height must be positive".to_string(),
            ));
        }
        Ok(())
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ConversionOptions::default();
        assert_eq!(options.format, OutputFormat::Jpg);
        assert_eq!(options.quality, 0.85);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_full_quality_domain_accepted() {
        assert!(ConversionOptions::new(OutputFormat::WebP, 0.0).validate().is_ok());
        assert!(ConversionOptions::new(OutputFormat::WebP, 1.0).validate().is_ok());
    }

    #[test]
    fn test_invalid_options_rejected() {
        assert!(ConversionOptions::new(OutputFormat::Jpg, 1.2).validate().is_err());
        assert!(ConversionOptions::new(OutputFormat::Jpg, -0.1).validate().is_err());
        assert!(ConversionOptions::new(OutputFormat::Jpg, f32::NAN)
            .validate()
            .is_err());
        assert!(ConversionOptions::default()
            .with_max_width(0)
            .validate()
            .is_err());
        assert!(ConversionOptions::default()
            .with_max_height(0)
            .validate()
            .is_err());
    }
}
