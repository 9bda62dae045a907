use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use super::{FileId, OutputHandle};

/// Raw file handed over by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub name: String,
    /// Media type declared by whoever supplied the file. Not trusted on its own.
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl InputFile {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            data: data.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

/// Lifecycle state of a file in a batch.
///
/// The converted size and output handle exist only on `Done`, the error
/// message only on `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Queued,
    Processing,
    Done {
        converted_size_bytes: usize,
        output: OutputHandle,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Queued,
    Processing,
    Done,
    Error,
}

impl Display for StatusKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StatusKind::Queued => write!(f, "queued"),
            StatusKind::Processing => write!(f, "processing"),
            StatusKind::Done => write!(f, "done"),
            StatusKind::Error => write!(f, "error"),
        }
    }
}

impl FileStatus {
    pub fn kind(&self) -> StatusKind {
        match self {
            FileStatus::Queued => StatusKind::Queued,
            FileStatus::Processing => StatusKind::Processing,
            FileStatus::Done { .. } => StatusKind::Done,
            FileStatus::Error { .. } => StatusKind::Error,
        }
    }
}

/// A file entry tracked by the batch orchestrator.
#[derive(Debug, Clone)]
pub struct ConversionFile {
    pub id: FileId,
    pub name: String,
    pub input: InputFile,
    pub status: FileStatus,
    pub original_size_bytes: usize,
    pub progress_percent: Option<u8>,
}

impl ConversionFile {
    pub fn new(input: InputFile) -> Self {
        Self {
            id: FileId::new(),
            name: input.name.clone(),
            original_size_bytes: input.size_bytes(),
            input,
            status: FileStatus::Queued,
            progress_percent: None,
        }
    }

    pub fn is_queued(&self) -> bool {
        self.status == FileStatus::Queued
    }

    pub fn is_processing(&self) -> bool {
        self.status == FileStatus::Processing
    }

    pub fn is_done(&self) -> bool {
        matches!(self.status, FileStatus::Done { .. })
    }

    pub fn converted_size_bytes(&self) -> Option<usize> {
        match self.status {
            FileStatus::Done {
                converted_size_bytes,
                ..
            } => Some(converted_size_bytes),
            _ => None,
        }
    }

    pub fn output(&self) -> Option<OutputHandle> {
        match self.status {
            FileStatus::Done { output, .. } => Some(output),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            FileStatus::Error { message } => Some(message),
            _ => None,
        }
    }

    pub fn original_kb(&self) -> u64 {
        to_kb(self.original_size_bytes)
    }

    pub fn converted_kb(&self) -> Option<u64> {
        self.converted_size_bytes().map(to_kb)
    }
}

fn to_kb(bytes: usize) -> u64 {
    (bytes as f64 / 1024.0).round() as u64
}
