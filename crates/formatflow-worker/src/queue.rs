//! Conversion queue: explicit start, submission, progress routing and teardown.

use formatflow_core::{ConversionOptions, ConversionResult, InputFile, QueueConfig, TaskId};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dispatch::{DispatchState, QueuedTask, ResponseOutcome};
use crate::error::QueueError;
use crate::worker::{self, WorkerRequest, WorkerResponse};

/// Caller side of one submitted conversion.
#[derive(Debug)]
pub struct TaskHandle {
    id: TaskId,
    progress_rx: mpsc::UnboundedReceiver<u8>,
    result_rx: oneshot::Receiver<Result<ConversionResult, QueueError>>,
    cancel: CancellationToken,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Request cancellation. A task still queued resolves as cancelled without
    /// running; a running task stops at its next stage boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the result, discarding progress.
    pub async fn wait(self) -> Result<ConversionResult, QueueError> {
        self.wait_with_progress(|_| {}).await
    }

    /// Wait for the result, calling `on_progress` for each percentage. Every
    /// progress value for this task is delivered before the result is returned.
    pub async fn wait_with_progress<F>(mut self, mut on_progress: F) -> Result<ConversionResult, QueueError>
    where
        F: FnMut(u8),
    {
        let result = loop {
            tokio::select! {
                biased;
                Some(percent) = self.progress_rx.recv() => on_progress(percent),
                result = &mut self.result_rx => break result,
            }
        };

        while let Ok(percent) = self.progress_rx.try_recv() {
            on_progress(percent);
        }

        // The dispatcher dropping the sender means it is gone
        result.unwrap_or(Err(QueueError::ShutDown))
    }
}

/// FIFO conversion queue backed by a single dedicated worker thread.
///
/// Concurrency is exactly one: the dispatcher hands the worker one task at a
/// time and starts the next only after the previous one reached done or error.
pub struct ConversionQueue {
    submit_tx: mpsc::UnboundedSender<QueuedTask>,
    shutdown: CancellationToken,
    dispatcher: JoinHandle<()>,
}

impl ConversionQueue {
    /// Spawn the worker thread and the dispatcher task. Must be called from
    /// within a tokio runtime.
    pub fn start(config: QueueConfig) -> Result<Self, QueueError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| QueueError::DispatchFailed(format!("no tokio runtime: {}", e)))?;

        let (request_tx, request_rx) = mpsc::unbounded_channel::<WorkerRequest>();
        let (response_tx, response_rx) = mpsc::unbounded_channel::<WorkerResponse>();

        std::thread::Builder::new()
            .name(config.worker_thread_name.clone())
            .spawn(move || worker::run(request_rx, response_tx))
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to spawn conversion worker thread");
                QueueError::DispatchFailed(format!("failed to spawn worker thread: {}", e))
            })?;

        let (submit_tx, submit_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let dispatcher = runtime.spawn(Self::dispatch_loop(
            submit_rx,
            request_tx,
            response_rx,
            shutdown.clone(),
        ));

        tracing::info!(
            worker_thread = %config.worker_thread_name,
            "Conversion queue started"
        );

        Ok(Self {
            submit_tx,
            shutdown,
            dispatcher,
        })
    }

    /// Append a conversion to the queue.
    #[tracing::instrument(skip(self, input, options), fields(name = %input.name, format = %options.format))]
    pub fn submit(
        &self,
        input: InputFile,
        options: ConversionOptions,
    ) -> Result<TaskHandle, QueueError> {
        if self.shutdown.is_cancelled() {
            return Err(QueueError::ShutDown);
        }

        let id = TaskId::new();
        let cancel = self.shutdown.child_token();
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = oneshot::channel();

        let task = QueuedTask {
            id,
            input,
            options,
            cancel: cancel.clone(),
            progress_tx,
            result_tx,
        };

        self.submit_tx.send(task).map_err(|_| QueueError::ShutDown)?;
        tracing::debug!(task_id = %id, "Conversion submitted");

        Ok(TaskHandle {
            id,
            progress_rx,
            result_rx,
            cancel,
        })
    }

    /// Submit and wait, reporting progress through `on_progress`.
    pub async fn convert<F>(
        &self,
        input: InputFile,
        options: ConversionOptions,
        on_progress: F,
    ) -> Result<ConversionResult, QueueError>
    where
        F: FnMut(u8),
    {
        self.submit(input, options)?
            .wait_with_progress(on_progress)
            .await
    }

    /// Stop the dispatcher and release the worker. Outstanding handles
    /// resolve to [`QueueError::ShutDown`]. Idempotent.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            tracing::info!("Shutting down conversion queue");
            self.shutdown.cancel();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Shut down and wait for the dispatcher to finish.
    pub async fn closed(mut self) {
        self.shutdown();
        if let Err(e) = (&mut self.dispatcher).await {
            tracing::warn!(error = %e, "Conversion dispatcher ended abnormally");
        }
    }

    async fn dispatch_loop(
        mut submit_rx: mpsc::UnboundedReceiver<QueuedTask>,
        request_tx: mpsc::UnboundedSender<WorkerRequest>,
        mut response_rx: mpsc::UnboundedReceiver<WorkerResponse>,
        shutdown: CancellationToken,
    ) {
        let mut state = DispatchState::new();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                response = response_rx.recv() => match response {
                    Some(response) => {
                        if state.on_response(response) == ResponseOutcome::Completed {
                            tracing::trace!(pending = state.pending_len(), "Worker slot freed");
                        }
                    }
                    None => {
                        tracing::error!("Conversion worker thread exited unexpectedly");
                        break;
                    }
                },
                task = submit_rx.recv() => match task {
                    Some(task) => state.enqueue(task),
                    None => break,
                },
            }

            while let Some(request) = state.next_request() {
                let task_id = request.task_id;
                match request_tx.send(request) {
                    Ok(()) => break,
                    Err(_) => {
                        tracing::error!(task_id = %task_id, "Conversion worker unreachable");
                        state.fail_active(QueueError::DispatchFailed(
                            "conversion worker unreachable".to_string(),
                        ));
                    }
                }
            }
        }

        submit_rx.close();
        while let Ok(task) = submit_rx.try_recv() {
            state.enqueue(task);
        }
        state.drain();

        tracing::info!("Conversion queue stopped");
    }
}

impl Drop for ConversionQueue {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
