//! FormatFlow Services Layer
//!
//! Coordination on top of the conversion engine and queue: the batch
//! orchestrator that owns the file list, the output store that owns converted
//! bytes, and the archive exporter. Front ends talk to this crate only.

pub mod archive;
pub mod backend;
pub mod batch;
pub mod error;
pub mod output_store;

pub use archive::{build_archive, sanitize_archive_filename, ArchiveExporter};
pub use backend::{ConversionBackend, InlineBackend};
pub use batch::{BatchEvent, BatchOrchestrator, BatchSummary};
pub use error::{ArchiveError, OutputStoreError};
pub use output_store::OutputStore;

pub use formatflow_worker::{ConversionQueue, QueueError};
