//! FormatFlow Core Library
//!
//! This crate provides the domain models, error types and configuration that are
//! shared by the processing engine, the conversion queue and the batch services.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{ArchiveConfig, ConfigError, ConverterConfig, QualityRange, QueueConfig};
pub use error::ConversionError;
pub use models::{
    output_file_name, ConversionFile, ConversionOptions, ConversionResult, ConversionStage,
    FileId, FileStatus, InputFile, OutputFormat, OutputHandle, StatusKind, TaskId,
};
