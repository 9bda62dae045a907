use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::OutputFormat;

/// Pipeline stage reached by a running conversion.
///
/// Each stage maps to a fixed progress milestone. The values are a UX signal
/// and only ever increase for a given conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStage {
    Started,
    Normalizing,
    Decoding,
    Rendering,
    Encoded,
}

impl ConversionStage {
    pub fn percent(self) -> u8 {
        match self {
            ConversionStage::Started => 5,
            ConversionStage::Normalizing => 15,
            ConversionStage::Decoding => 30,
            ConversionStage::Rendering => 60,
            ConversionStage::Encoded => 100,
        }
    }
}

/// Output of a successful conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    pub data: Bytes,
    pub size_bytes: usize,
    pub output_name: String,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

impl ConversionResult {
    pub fn new(
        data: Bytes,
        output_name: String,
        format: OutputFormat,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            size_bytes: data.len(),
            data,
            output_name,
            format,
            width,
            height,
        }
    }
}
