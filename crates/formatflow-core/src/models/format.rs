use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::ConversionError;

/// Output format for converted images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpg,
    Png,
    WebP,
}

impl OutputFormat {
    /// Canonical file extension, without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::WebP => "image/webp",
        }
    }

    /// Lossless formats ignore the quality setting.
    pub fn is_lossless(self) -> bool {
        matches!(self, OutputFormat::Png)
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(OutputFormat::Jpg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::WebP),
            other => Err(ConversionError::InvalidOptions(format!(
                "Unsupported output format: {}",
                other
            ))),
        }
    }
}

/// Derive the output file name by replacing the final extension of `name`
/// with the canonical extension of `format`.
///
/// Only a trailing `.segment` without further dots or slashes counts as an
/// extension; names without one get the extension appended.
pub fn output_file_name(name: &str, format: OutputFormat) -> String {
    format!("{}.{}", strip_extension(name), format.extension())
}

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx + 1 < name.len() && !name[idx + 1..].contains('/') => &name[..idx],
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("jpg".parse::<OutputFormat>().unwrap(), OutputFormat::Jpg);
        assert_eq!("JPEG".parse::<OutputFormat>().unwrap(), OutputFormat::Jpg);
        assert_eq!("png".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
        assert_eq!("WebP".parse::<OutputFormat>().unwrap(), OutputFormat::WebP);
        assert!("avif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_output_format_to_mime_type() {
        assert_eq!(OutputFormat::Jpg.mime_type(), "image/jpeg");
        assert_eq!(OutputFormat::Png.mime_type(), "image/png");
        assert_eq!(OutputFormat::WebP.mime_type(), "image/webp");
        assert!(OutputFormat::Png.is_lossless());
        assert!(!OutputFormat::WebP.is_lossless());
    }

    #[test]
    fn test_output_file_name_replaces_extension() {
        assert_eq!(output_file_name("photo.jpg", OutputFormat::WebP), "photo.webp");
        assert_eq!(output_file_name("IMG_0001.HEIC", OutputFormat::Jpg), "IMG_0001.jpg");
        assert_eq!(
            output_file_name("archive.tar.gz", OutputFormat::Png),
            "archive.tar.png"
        );
    }

    #[test]
    fn test_output_file_name_without_extension() {
        assert_eq!(output_file_name("scan", OutputFormat::Png), "scan.png");
        assert_eq!(output_file_name("dir.v2/scan", OutputFormat::Png), "dir.v2/scan.png");
        assert_eq!(output_file_name("trailing.", OutputFormat::Jpg), "trailing..jpg");
    }
}
