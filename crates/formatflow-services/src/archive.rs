//! Archive export
//!
//! Bundles every converted output of a batch into one zip file. Entry names
//! are the original names with their extension replaced by the batch's output
//! format.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use formatflow_core::{output_file_name, ArchiveConfig, ConversionFile, OutputFormat};

use crate::error::ArchiveError;
use crate::output_store::OutputStore;

/// One file to place in the archive, under its original name.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub name: String,
    pub data: Bytes,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Reduce an entry name to its base name so nothing extracts outside the
/// target directory.
pub fn sanitize_archive_filename(filename: &str, fallback: &str) -> String {
    Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or(fallback)
        .to_string()
}

/// Build a deflated zip with one entry per input.
///
/// When two inputs map to the same entry name, the later one replaces the
/// earlier one in place.
pub fn build_archive(entries: &[ArchiveEntry], format: OutputFormat) -> Result<Vec<u8>, ArchiveError> {
    use zip::write::{FileOptions, ZipWriter};
    use zip::CompressionMethod;

    let mut named: Vec<(String, &Bytes)> = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let fallback = format!("converted_{}", index + 1);
        let base = sanitize_archive_filename(&entry.name, &fallback);
        let name = output_file_name(&base, format);

        match named.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => {
                tracing::warn!(entry = %name, "Duplicate archive entry name, keeping the later file");
                slot.1 = &entry.data;
            }
            None => named.push((name, &entry.data)),
        }
    }

    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        for (name, data) in &named {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(data)?;
        }

        zip.finish()?;
    }

    tracing::debug!(entries = named.len(), size = buffer.len(), "Archive assembled");
    Ok(buffer)
}

/// Saves a batch's outputs as a single archive in the configured directory.
#[derive(Clone)]
pub struct ArchiveExporter {
    store: OutputStore,
    config: ArchiveConfig,
}

impl ArchiveExporter {
    pub fn new(store: OutputStore, config: ArchiveConfig) -> Self {
        Self { store, config }
    }

    pub fn archive_path(&self) -> PathBuf {
        self.config.archive_path()
    }

    /// Export every done file of `files`. Returns the archive path, or `None`
    /// when there is nothing to export or anything went wrong. Failures are
    /// logged, never returned.
    #[tracing::instrument(skip(self, files), fields(format = %format, path = %self.archive_path().display()))]
    pub async fn export_all(&self, files: &[ConversionFile], format: OutputFormat) -> Option<PathBuf> {
        let done: Vec<(&str, _)> = files
            .iter()
            .filter_map(|f| f.output().map(|handle| (f.name.as_str(), handle)))
            .collect();

        if done.is_empty() {
            tracing::info!("No converted files to export");
            return None;
        }

        match self.try_export(&done, format).await {
            Ok(path) => {
                tracing::info!(entries = done.len(), "Archive saved");
                Some(path)
            }
            Err(e) => {
                tracing::error!(error = %e, error_code = e.error_code(), "Archive export failed");
                None
            }
        }
    }

    async fn try_export(
        &self,
        done: &[(&str, formatflow_core::OutputHandle)],
        format: OutputFormat,
    ) -> Result<PathBuf, ArchiveError> {
        let mut entries = Vec::with_capacity(done.len());
        for (name, handle) in done {
            let data = self
                .store
                .fetch(*handle)
                .map_err(|source| ArchiveError::OutputUnavailable {
                    name: name.to_string(),
                    source,
                })?;
            entries.push(ArchiveEntry::new(*name, data));
        }

        let archive = tokio::task::spawn_blocking(move || build_archive(&entries, format))
            .await
            .map_err(|e| ArchiveError::AssemblyFailed(format!("archive task failed: {}", e)))??;

        let path = self.archive_path();
        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        tokio::fs::write(&path, &archive).await?;

        Ok(path)
    }
}
