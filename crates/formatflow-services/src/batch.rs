//! Batch orchestrator
//!
//! Owns the ordered list of file entries and their lifecycle
//! (queued → processing → done | error), drives conversion through a
//! [`ConversionBackend`] one file at a time, and keeps output handles in the
//! [`OutputStore`] in step with the entries that reference them.
//!
//! State lives behind a `std::sync::Mutex` that is never held across an
//! `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use formatflow_core::constants::CONVERSION_FAILED_MESSAGE;
use formatflow_core::{
    ConversionError, ConversionFile, ConversionOptions, FileId, FileStatus, InputFile, StatusKind,
};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::backend::ConversionBackend;
use crate::output_store::OutputStore;

const EVENT_CAPACITY: usize = 256;

/// Change notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    FileAdded { id: FileId, name: String },
    StatusChanged { id: FileId, status: StatusKind },
    Progress { id: FileId, percent: u8 },
    FileRemoved { id: FileId },
}

/// Outcome counts of one `convert_all` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub converted: usize,
    pub failed: usize,
    /// Entries removed while the run was in progress.
    pub skipped: usize,
}

#[derive(Debug)]
struct BatchState {
    files: Vec<ConversionFile>,
    options: ConversionOptions,
    processing: bool,
}

impl BatchState {
    fn entry_mut(&mut self, id: FileId) -> Option<&mut ConversionFile> {
        self.files.iter_mut().find(|f| f.id == id)
    }
}

/// Clears the processing flag when a run ends, including when its future is
/// dropped mid-way.
struct ProcessingGuard {
    state: Arc<Mutex<BatchState>>,
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        lock(&self.state).processing = false;
    }
}

fn lock(state: &Mutex<BatchState>) -> MutexGuard<'_, BatchState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct BatchOrchestrator<B: ConversionBackend> {
    backend: B,
    store: OutputStore,
    state: Arc<Mutex<BatchState>>,
    events: broadcast::Sender<BatchEvent>,
}

impl<B: ConversionBackend> BatchOrchestrator<B> {
    pub fn new(backend: B, store: OutputStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            backend,
            store,
            state: Arc::new(Mutex::new(BatchState {
                files: Vec::new(),
                options: ConversionOptions::default(),
                processing: false,
            })),
            events,
        }
    }

    pub fn with_options(self, options: ConversionOptions) -> Self {
        lock(&self.state).options = options;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &OutputStore {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: BatchEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Append files as queued entries, in order. Returns their new ids.
    pub fn add_files(&self, inputs: Vec<InputFile>) -> Vec<FileId> {
        let added: Vec<(FileId, String)> = {
            let mut state = lock(&self.state);
            inputs
                .into_iter()
                .map(|input| {
                    let file = ConversionFile::new(input);
                    let added = (file.id, file.name.clone());
                    state.files.push(file);
                    added
                })
                .collect()
        };

        for (id, name) in &added {
            tracing::debug!(file_id = %id, name = %name, "File added");
            self.emit(BatchEvent::FileAdded {
                id: *id,
                name: name.clone(),
            });
        }

        added.into_iter().map(|(id, _)| id).collect()
    }

    /// Convert every entry that is queued right now, one at a time, in list
    /// order. Entries added during the run stay queued. Does nothing when the
    /// list is empty or a run is already in progress.
    #[tracing::instrument(skip(self))]
    pub async fn convert_all(&self) -> BatchSummary {
        let (ids, options) = {
            let mut state = lock(&self.state);
            if state.processing || state.files.is_empty() {
                tracing::debug!(processing = state.processing, "Nothing to start");
                return BatchSummary::default();
            }
            state.processing = true;
            let ids: Vec<FileId> = state
                .files
                .iter()
                .filter(|f| f.is_queued())
                .map(|f| f.id)
                .collect();
            (ids, state.options)
        };
        let _guard = ProcessingGuard {
            state: self.state.clone(),
        };

        tracing::info!(files = ids.len(), format = %options.format, quality = options.quality, "Batch conversion started");

        let mut summary = BatchSummary::default();
        for id in ids {
            let Some(input) = self.begin(id) else {
                summary.skipped += 1;
                continue;
            };

            let state = self.state.clone();
            let events = self.events.clone();
            let on_progress = move |percent: u8| {
                if let Some(file) = lock(&state).entry_mut(id) {
                    file.progress_percent = Some(percent);
                }
                let _ = events.send(BatchEvent::Progress { id, percent });
            };

            let result = self.backend.convert(input, options, &on_progress).await;

            match result {
                Ok(result) => {
                    let handle = self.store.register(result.data);
                    let stored = {
                        let mut state = lock(&self.state);
                        match state.entry_mut(id) {
                            Some(file) => {
                                file.status = FileStatus::Done {
                                    converted_size_bytes: result.size_bytes,
                                    output: handle,
                                };
                                file.progress_percent = Some(100);
                                true
                            }
                            None => false,
                        }
                    };

                    if stored {
                        tracing::info!(
                            file_id = %id,
                            output = %result.output_name,
                            size = result.size_bytes,
                            width = result.width,
                            height = result.height,
                            "File converted"
                        );
                        summary.converted += 1;
                        self.emit(BatchEvent::StatusChanged {
                            id,
                            status: StatusKind::Done,
                        });
                    } else {
                        tracing::debug!(file_id = %id, "Entry removed during conversion, releasing output");
                        self.store.release(handle);
                        summary.skipped += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(file_id = %id, error = %e, error_code = e.error_code(), "File conversion failed");
                    let recorded = {
                        let mut state = lock(&self.state);
                        match state.entry_mut(id) {
                            Some(file) => {
                                file.status = FileStatus::Error {
                                    message: CONVERSION_FAILED_MESSAGE.to_string(),
                                };
                                true
                            }
                            None => false,
                        }
                    };

                    if recorded {
                        summary.failed += 1;
                        self.emit(BatchEvent::StatusChanged {
                            id,
                            status: StatusKind::Error,
                        });
                    } else {
                        summary.skipped += 1;
                    }
                }
            }
        }

        tracing::info!(
            converted = summary.converted,
            failed = summary.failed,
            skipped = summary.skipped,
            "Batch conversion finished"
        );
        summary
    }

    /// Move a still-queued entry to processing and hand back its input.
    fn begin(&self, id: FileId) -> Option<InputFile> {
        let input = {
            let mut state = lock(&self.state);
            let file = state.entry_mut(id).filter(|f| f.is_queued())?;
            file.status = FileStatus::Processing;
            file.progress_percent = Some(0);
            file.input.clone()
        };
        self.emit(BatchEvent::StatusChanged {
            id,
            status: StatusKind::Processing,
        });
        Some(input)
    }

    /// Remove an entry whatever its status, releasing its output. Returns
    /// false when no such entry exists.
    pub fn remove_file(&self, id: FileId) -> bool {
        let removed = {
            let mut state = lock(&self.state);
            state
                .files
                .iter()
                .position(|f| f.id == id)
                .map(|index| state.files.remove(index))
        };

        let Some(file) = removed else {
            return false;
        };

        if let Some(handle) = file.output() {
            self.store.release(handle);
        }
        tracing::debug!(file_id = %id, status = %file.status.kind(), "File removed");
        self.emit(BatchEvent::FileRemoved { id });
        true
    }

    pub fn completed_count(&self) -> usize {
        lock(&self.state).files.iter().filter(|f| f.is_done()).count()
    }

    pub fn is_processing(&self) -> bool {
        lock(&self.state).processing
    }

    pub fn has_files(&self) -> bool {
        !lock(&self.state).files.is_empty()
    }

    /// Snapshot of all entries in list order.
    pub fn files(&self) -> Vec<ConversionFile> {
        lock(&self.state).files.clone()
    }

    pub fn file(&self, id: FileId) -> Option<ConversionFile> {
        lock(&self.state).files.iter().find(|f| f.id == id).cloned()
    }

    pub fn options(&self) -> ConversionOptions {
        lock(&self.state).options
    }

    /// Options for the next run. A run already in progress keeps the options
    /// it started with.
    pub fn set_options(&self, options: ConversionOptions) -> Result<(), ConversionError> {
        options.validate()?;
        lock(&self.state).options = options;
        Ok(())
    }

    /// Converted bytes of a done entry.
    pub fn output_bytes(&self, id: FileId) -> Option<Bytes> {
        let handle = self.file(id)?.output()?;
        self.store.fetch(handle).ok()
    }

    /// Release every output and the backend's execution context.
    pub fn shutdown(&self) {
        let released = self.store.release_all();
        self.backend.shutdown();
        tracing::info!(released, "Batch orchestrator shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{InlineBackend, ProgressFn};
    use async_trait::async_trait;
    use formatflow_core::{ConversionResult, OutputFormat};
    use formatflow_processing::test_helpers::{jpeg_fixture, png_fixture};
    use formatflow_worker::QueueError;

    fn orchestrator() -> BatchOrchestrator<InlineBackend> {
        BatchOrchestrator::new(InlineBackend, OutputStore::new())
    }

    /// Backend that drops one entry from the batch while converting it, the
    /// way a removal racing an in-flight conversion would.
    struct RemovingBackend {
        victim: Mutex<Option<(Arc<Mutex<BatchState>>, FileId)>>,
    }

    #[async_trait]
    impl ConversionBackend for RemovingBackend {
        async fn convert(
            &self,
            input: InputFile,
            options: ConversionOptions,
            _on_progress: ProgressFn<'_>,
        ) -> Result<ConversionResult, QueueError> {
            let victim = self.victim.lock().unwrap().take();
            if let Some((state, id)) = victim {
                lock(&state).files.retain(|f| f.id != id);
            }
            formatflow_processing::ConversionEngine::convert(&input, &options)
                .map_err(QueueError::from)
        }
    }

    #[tokio::test]
    async fn test_add_files_appends_queued_entries() {
        let batch = orchestrator();
        let ids = batch.add_files(vec![
            InputFile::new("a.jpg", jpeg_fixture(8, 8)),
            InputFile::new("b.png", png_fixture(8, 8)),
        ]);

        let files = batch.files();
        assert_eq!(files.len(), 2);
        assert_eq!(files.iter().map(|f| f.id).collect::<Vec<_>>(), ids);
        assert!(files.iter().all(|f| f.is_queued()));
        assert_eq!(files[0].original_size_bytes, files[0].input.size_bytes());
        assert!(batch.has_files());
    }

    #[tokio::test]
    async fn test_convert_all_on_empty_batch_is_noop() {
        let batch = orchestrator();
        assert_eq!(batch.convert_all().await, BatchSummary::default());
        assert!(!batch.is_processing());
    }

    #[tokio::test]
    async fn test_done_entries_hold_registered_output() {
        let batch = orchestrator();
        let ids = batch.add_files(vec![InputFile::new("a.jpg", jpeg_fixture(8, 8))]);
        batch
            .set_options(ConversionOptions::new(OutputFormat::Png, 0.9))
            .unwrap();

        let summary = batch.convert_all().await;
        assert_eq!(summary.converted, 1);

        let file = batch.file(ids[0]).unwrap();
        assert_eq!(file.progress_percent, Some(100));
        let bytes = batch.output_bytes(ids[0]).unwrap();
        assert_eq!(file.converted_size_bytes(), Some(bytes.len()));
        assert!(batch.store().contains(file.output().unwrap()));
        assert_eq!(batch.completed_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_entry_gets_fixed_message() {
        let batch = orchestrator();
        let ids = batch.add_files(vec![InputFile::new("bad.jpg", b"garbage".to_vec())]);

        let summary = batch.convert_all().await;
        assert_eq!(summary.failed, 1);

        let file = batch.file(ids[0]).unwrap();
        assert_eq!(file.error(), Some(CONVERSION_FAILED_MESSAGE));
        assert_eq!(file.output(), None);
        assert!(batch.store().is_empty());
    }

    #[tokio::test]
    async fn test_already_converted_entries_are_not_redone() {
        let batch = orchestrator();
        batch.add_files(vec![InputFile::new("a.jpg", jpeg_fixture(8, 8))]);
        assert_eq!(batch.convert_all().await.converted, 1);

        assert_eq!(batch.convert_all().await, BatchSummary::default());
        assert_eq!(batch.store().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_releases_output_and_is_idempotent() {
        let batch = orchestrator();
        let ids = batch.add_files(vec![InputFile::new("a.jpg", jpeg_fixture(8, 8))]);
        batch.convert_all().await;
        let handle = batch.file(ids[0]).unwrap().output().unwrap();

        assert!(batch.remove_file(ids[0]));
        assert!(!batch.store().contains(handle));
        assert!(!batch.remove_file(ids[0]));
        assert!(!batch.has_files());
    }

    #[tokio::test]
    async fn test_result_for_removed_entry_is_released() {
        let backend = RemovingBackend {
            victim: Mutex::new(None),
        };
        let batch = BatchOrchestrator::new(backend, OutputStore::new());
        let ids = batch.add_files(vec![
            InputFile::new("gone.jpg", jpeg_fixture(8, 8)),
            InputFile::new("kept.jpg", jpeg_fixture(8, 8)),
        ]);
        *batch.backend().victim.lock().unwrap() = Some((batch.state.clone(), ids[0]));

        let summary = batch.convert_all().await;

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.converted, 1);
        assert_eq!(batch.store().len(), 1);
        assert_eq!(batch.files().len(), 1);
        assert_eq!(batch.files()[0].id, ids[1]);
    }

    #[tokio::test]
    async fn test_events_follow_lifecycle() {
        let batch = orchestrator();
        let mut events = batch.subscribe();
        let ids = batch.add_files(vec![InputFile::new("a.png", png_fixture(4, 4))]);
        batch.convert_all().await;
        batch.remove_file(ids[0]);

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }

        let id = ids[0];
        assert_eq!(seen.first(), Some(&BatchEvent::FileAdded { id, name: "a.png".to_string() }));
        assert!(seen.contains(&BatchEvent::StatusChanged { id, status: StatusKind::Processing }));
        assert!(seen.contains(&BatchEvent::Progress { id, percent: 100 }));
        assert_eq!(
            &seen[seen.len() - 2..],
            &[
                BatchEvent::StatusChanged { id, status: StatusKind::Done },
                BatchEvent::FileRemoved { id },
            ]
        );
    }

    #[tokio::test]
    async fn test_set_options_rejects_invalid_quality() {
        let batch = orchestrator();
        let result = batch.set_options(ConversionOptions::new(OutputFormat::WebP, 2.0));
        assert!(matches!(result, Err(ConversionError::InvalidOptions(_))));
        assert_eq!(batch.options(), ConversionOptions::default());
    }

    #[tokio::test]
    async fn test_shutdown_releases_everything() {
        let batch = orchestrator();
        batch.add_files(vec![
            InputFile::new("a.jpg", jpeg_fixture(8, 8)),
            InputFile::new("b.jpg", jpeg_fixture(8, 8)),
        ]);
        batch.convert_all().await;
        assert_eq!(batch.store().len(), 2);

        batch.shutdown();
        assert!(batch.store().is_empty());
    }
}
