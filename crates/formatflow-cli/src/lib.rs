use std::path::{Path, PathBuf};

use formatflow_core::constants::ACCEPTED_EXTENSIONS;
use formatflow_core::{ConversionFile, InputFile, OutputFormat, StatusKind};
use serde::Serialize;

/// Lowercased extension of `path` if it is one of the accepted input types.
pub fn accepted_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    ACCEPTED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Media type implied by an accepted extension.
pub fn content_type_for(extension: &str) -> Option<&'static str> {
    match extension {
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        other => other.parse::<OutputFormat>().ok().map(OutputFormat::mime_type),
    }
}

/// Per-file line of the JSON report.
#[derive(Debug, Serialize)]
pub struct FileReport {
    pub name: String,
    pub status: StatusKind,
    pub original_kb: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted_kb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_to: Option<String>,
}

impl From<&ConversionFile> for FileReport {
    fn from(file: &ConversionFile) -> Self {
        Self {
            name: file.name.clone(),
            status: file.status.kind(),
            original_kb: file.original_kb(),
            converted_kb: file.converted_kb(),
            error: file.error().map(str::to_string),
            saved_to: None,
        }
    }
}

/// An input that never made it into the batch.
#[derive(Debug, Serialize)]
pub struct RejectedInput {
    pub path: String,
    pub reason: String,
}

/// Read every accepted path into an [`InputFile`]. Paths with another
/// extension, or that cannot be read, are reported instead.
pub async fn read_inputs(paths: Vec<PathBuf>) -> (Vec<InputFile>, Vec<RejectedInput>) {
    let mut inputs = Vec::new();
    let mut rejected = Vec::new();

    for path in paths {
        let shown = path.display().to_string();
        let Some(ext) = accepted_extension(&path) else {
            tracing::warn!(path = %shown, "Skipping unsupported file type");
            rejected.push(RejectedInput {
                path: shown,
                reason: "unsupported file type".to_string(),
            });
            continue;
        };

        match tokio::fs::read(&path).await {
            Ok(data) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| shown.clone());
                let mut input = InputFile::new(name, data);
                if let Some(content_type) = content_type_for(&ext) {
                    input = input.with_content_type(content_type);
                }
                inputs.push(input);
            }
            Err(e) => {
                tracing::warn!(path = %shown, error = %e, "Failed to read input");
                rejected.push(RejectedInput {
                    path: shown,
                    reason: e.to_string(),
                });
            }
        }
    }

    (inputs, rejected)
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
