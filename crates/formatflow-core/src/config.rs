//! Configuration module
//!
//! Configuration is plain data with sensible defaults. Front ends build a
//! [`ConverterConfig`] from their own inputs (command-line flags, UI controls)
//! and call [`ConverterConfig::validate`] before handing it to the services.

use std::path::PathBuf;

use crate::constants::{
    ARCHIVE_FILE_NAME, UI_QUALITY_MAX, UI_QUALITY_MIN, UI_QUALITY_STEP, WORKER_THREAD_NAME,
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Conversion queue configuration
#[derive(Clone, Debug)]
pub struct QueueConfig {
    /// Name given to the dedicated conversion thread.
    pub worker_thread_name: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            worker_thread_name: WORKER_THREAD_NAME.to_string(),
        }
    }
}

/// Archive export configuration
#[derive(Clone, Debug)]
pub struct ArchiveConfig {
    pub file_name: String,
    pub output_dir: PathBuf,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            file_name: ARCHIVE_FILE_NAME.to_string(),
            output_dir: PathBuf::from("."),
        }
    }
}

impl ArchiveConfig {
    pub fn archive_path(&self) -> PathBuf {
        self.output_dir.join(&self.file_name)
    }
}

/// Quality range offered to users. The engine itself accepts the full [0, 1]
/// domain; this only constrains what a front end lets people pick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QualityRange {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl Default for QualityRange {
    fn default() -> Self {
        Self {
            min: UI_QUALITY_MIN,
            max: UI_QUALITY_MAX,
            step: UI_QUALITY_STEP,
        }
    }
}

impl QualityRange {
    pub fn contains(&self, quality: f32) -> bool {
        quality >= self.min && quality <= self.max
    }

    /// Clamp `quality` into the range and round it to the nearest step.
    pub fn snap(&self, quality: f32) -> f32 {
        if quality.is_nan() {
            return self.min;
        }
        let clamped = quality.clamp(self.min, self.max);
        let steps = ((clamped - self.min) / self.step).round();
        let snapped = (self.min + steps * self.step).min(self.max);
        // Keep two decimals so 0.85 stays 0.85 and not 0.85000004
        (snapped * 100.0).round() / 100.0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.min) || !(0.0..=1.0).contains(&self.max) {
            return Err(ConfigError::Invalid(format!(
                "quality range must lie within [0, 1], got [{}, {}]",
                self.min, self.max
            )));
        }
        if self.min > self.max {
            return Err(ConfigError::Invalid(format!(
                "quality range minimum {} exceeds maximum {}",
                self.min, self.max
            )));
        }
        if self.step <= 0.0 || self.step.is_nan() {
            return Err(ConfigError::Invalid(format!(
                "quality step must be positive, got {}",
                self.step
            )));
        }
        Ok(())
    }
}

/// Top-level converter configuration.
#[derive(Clone, Debug, Default)]
pub struct ConverterConfig {
    pub queue: QueueConfig,
    pub archive: ArchiveConfig,
    pub quality: QualityRange,
}

impl ConverterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.worker_thread_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "worker thread name cannot be empty".to_string(),
            ));
        }
        if self.archive.file_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "archive file name cannot be empty".to_string(),
            ));
        }
        self.quality.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ConverterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.archive.file_name, "converted-images.zip");
        assert_eq!(config.queue.worker_thread_name, "formatflow-convert");
    }

    #[test]
    fn test_archive_path_joins_output_dir() {
        let config = ArchiveConfig {
            file_name: "out.zip".to_string(),
            output_dir: PathBuf::from("/tmp/batch"),
        };
        assert_eq!(config.archive_path(), PathBuf::from("/tmp/batch/out.zip"));
    }

    #[test]
    fn test_quality_range_snap() {
        let range = QualityRange::default();
        assert_eq!(range.snap(0.85), 0.85);
        assert_eq!(range.snap(0.87), 0.85);
        assert_eq!(range.snap(0.88), 0.90);
        assert_eq!(range.snap(0.1), 0.40);
        assert_eq!(range.snap(1.5), 1.00);
        assert_eq!(range.snap(f32::NAN), 0.40);
    }

    #[test]
    fn test_quality_range_contains() {
        let range = QualityRange::default();
        assert!(range.contains(0.40));
        assert!(range.contains(1.0));
        assert!(!range.contains(0.39));
        assert!(!range.contains(1.01));
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        let inverted = QualityRange {
            min: 0.9,
            max: 0.5,
            step: 0.05,
        };
        assert!(inverted.validate().is_err());

        let zero_step = QualityRange {
            step: 0.0,
            ..QualityRange::default()
        };
        assert!(zero_step.validate().is_err());

        let mut config = ConverterConfig::default();
        config.archive.file_name = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
