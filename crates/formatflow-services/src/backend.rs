//! Conversion backend abstraction
//!
//! The orchestrator does not care where a conversion runs. Both backends run
//! the same [`ConversionEngine`]; the queue on its dedicated worker thread, the
//! inline backend on tokio's blocking pool.

use async_trait::async_trait;
use formatflow_core::{ConversionError, ConversionOptions, ConversionResult, ConversionStage, InputFile};
use formatflow_processing::ConversionEngine;
use formatflow_worker::{ConversionQueue, QueueError};
use tokio::sync::mpsc;

/// Progress callback handed to a backend. Receives percentages in [0, 100].
pub type ProgressFn<'a> = &'a (dyn Fn(u8) + Send + Sync);

#[async_trait]
pub trait ConversionBackend: Send + Sync {
    /// Convert one file, reporting progress before returning the result.
    async fn convert(
        &self,
        input: InputFile,
        options: ConversionOptions,
        on_progress: ProgressFn<'_>,
    ) -> Result<ConversionResult, QueueError>;

    /// Release whatever execution context the backend holds.
    fn shutdown(&self) {}
}

#[async_trait]
impl ConversionBackend for ConversionQueue {
    async fn convert(
        &self,
        input: InputFile,
        options: ConversionOptions,
        on_progress: ProgressFn<'_>,
    ) -> Result<ConversionResult, QueueError> {
        ConversionQueue::convert(self, input, options, on_progress).await
    }

    fn shutdown(&self) {
        ConversionQueue::shutdown(self);
    }
}

/// Runs the engine on the blocking pool, one call at a time per caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineBackend;

#[async_trait]
impl ConversionBackend for InlineBackend {
    async fn convert(
        &self,
        input: InputFile,
        options: ConversionOptions,
        on_progress: ProgressFn<'_>,
    ) -> Result<ConversionResult, QueueError> {
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();

        let mut task = tokio::task::spawn_blocking(move || {
            let mut observer = |stage: ConversionStage| -> Result<(), ConversionError> {
                let _ = progress_tx.send(stage.percent());
                Ok(())
            };
            ConversionEngine::convert_with_observer(&input, &options, &mut observer)
        });

        let joined = loop {
            tokio::select! {
                biased;
                Some(percent) = progress_rx.recv() => on_progress(percent),
                joined = &mut task => break joined,
            }
        };

        while let Ok(percent) = progress_rx.try_recv() {
            on_progress(percent);
        }

        joined
            .map_err(|e| QueueError::DispatchFailed(format!("conversion task failed: {}", e)))?
            .map_err(QueueError::from)
    }
}
