use formatflow_core::OutputHandle;
use thiserror::Error;

/// Output store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutputStoreError {
    /// The handle was never registered or has been released.
    #[error("Output not available: {0}")]
    NotFound(OutputHandle),
}

impl OutputStoreError {
    pub fn error_code(&self) -> &'static str {
        match self {
            OutputStoreError::NotFound(_) => "OUTPUT_NOT_FOUND",
        }
    }
}

/// Archive assembly and export errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive assembly failed: {0}")]
    AssemblyFailed(String),

    #[error("Output for {name} is unavailable: {source}")]
    OutputUnavailable {
        name: String,
        #[source]
        source: OutputStoreError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ArchiveError::AssemblyFailed(_) => "ARCHIVE_ASSEMBLY_FAILED",
            ArchiveError::OutputUnavailable { .. } => "ARCHIVE_OUTPUT_UNAVAILABLE",
            ArchiveError::Io(_) => "ARCHIVE_IO",
        }
    }
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(e: zip::result::ZipError) -> Self {
        ArchiveError::AssemblyFailed(e.to_string())
    }
}
