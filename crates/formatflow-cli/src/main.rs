//! FormatFlow CLI: batch-convert images locally.
//!
//! Logging goes to stderr and follows RUST_LOG (default `info`); the JSON
//! report goes to stdout.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use formatflow_cli::{init_tracing, read_inputs, FileReport, RejectedInput};
use formatflow_core::{
    output_file_name, ArchiveConfig, ConversionOptions, ConverterConfig, OutputFormat, QualityRange,
};
use formatflow_services::{
    sanitize_archive_filename, ArchiveExporter, BatchEvent, BatchOrchestrator, BatchSummary,
    ConversionQueue, OutputStore,
};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser)]
#[command(name = "formatflow", about = "Batch image converter (HEIC/HEIF, JPEG, PNG, WebP)")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert files to one output format
    Convert {
        /// Input files (jpg, jpeg, png, webp, heic, heif)
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output format: jpg, png or webp
        #[arg(long, default_value = "jpg")]
        format: OutputFormat,
        /// Output quality between 0.40 and 1.00, in steps of 0.05 (ignored for png)
        #[arg(long, default_value = "0.85")]
        quality: f32,
        /// Maximum output width in pixels
        #[arg(long)]
        max_width: Option<u32>,
        /// Maximum output height in pixels
        #[arg(long)]
        max_height: Option<u32>,
        /// Directory for converted files and the archive
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// Also save every converted file into converted-images.zip
        #[arg(long)]
        archive: bool,
        /// Do not save converted files individually
        #[arg(long)]
        no_files: bool,
    },
}

#[derive(Serialize)]
struct ConvertReport {
    format: OutputFormat,
    mime_type: &'static str,
    quality: f32,
    summary: BatchSummary,
    files: Vec<FileReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    rejected: Vec<RejectedInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    archive: Option<String>,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize report")?;
    println!("{}", out);
    Ok(())
}

async fn save_outputs(
    batch: &BatchOrchestrator<ConversionQueue>,
    out_dir: &Path,
    format: OutputFormat,
    reports: &mut [FileReport],
) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("Failed to create output directory {}", out_dir.display()))?;

    for (file, report) in batch.files().iter().zip(reports.iter_mut()) {
        let Some(data) = batch.output_bytes(file.id) else {
            continue;
        };
        let name = output_file_name(&sanitize_archive_filename(&file.name, "converted"), format);
        let path = out_dir.join(name);
        tokio::fs::write(&path, &data)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        report.saved_to = Some(path.display().to_string());
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            files,
            format,
            quality,
            max_width,
            max_height,
            out_dir,
            archive,
            no_files,
        } => {
            let range = QualityRange::default();
            let config = ConverterConfig {
                archive: ArchiveConfig {
                    output_dir: out_dir.clone(),
                    ..ArchiveConfig::default()
                },
                quality: range,
                ..ConverterConfig::default()
            };
            config.validate().context("Invalid configuration")?;

            if !config.quality.contains(quality) {
                tracing::warn!(
                    requested = quality,
                    min = config.quality.min,
                    max = config.quality.max,
                    "Quality outside the supported range, clamping"
                );
            }
            let snapped = config.quality.snap(quality);

            let mut options = ConversionOptions::new(format, snapped);
            options.max_width = max_width;
            options.max_height = max_height;

            let (inputs, rejected) = read_inputs(files).await;

            let queue = ConversionQueue::start(config.queue.clone())
                .context("Failed to start conversion queue")?;
            let store = OutputStore::new();
            let batch = BatchOrchestrator::new(queue, store.clone());
            batch.set_options(options).context("Invalid conversion options")?;

            let mut events = batch.subscribe();
            let progress_log = tokio::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(BatchEvent::Progress { id, percent }) => {
                            tracing::debug!(file_id = %id, percent, "Progress");
                        }
                        Ok(BatchEvent::StatusChanged { id, status }) => {
                            tracing::debug!(file_id = %id, status = %status, "Status changed");
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "Progress log lagging");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            });

            batch.add_files(inputs);
            let summary = batch.convert_all().await;

            let mut reports: Vec<FileReport> = batch.files().iter().map(FileReport::from).collect();
            if !no_files {
                save_outputs(&batch, &out_dir, format, &mut reports).await?;
            }

            let archive_path = if archive {
                let exporter = ArchiveExporter::new(store, config.archive.clone());
                exporter
                    .export_all(&batch.files(), batch.options().format)
                    .await
                    .map(|p| p.display().to_string())
            } else {
                None
            };

            batch.shutdown();
            progress_log.abort();

            print_json(&ConvertReport {
                format,
                mime_type: format.mime_type(),
                quality: snapped,
                summary,
                files: reports,
                rejected,
                archive: archive_path,
            })?;
        }
    }

    Ok(())
}
