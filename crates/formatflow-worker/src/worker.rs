//! The dedicated conversion thread.
//!
//! Receives one request at a time, runs the engine, and reports stage progress
//! followed by exactly one terminal event, all tagged with the request's task id.

use formatflow_core::{
    ConversionError, ConversionOptions, ConversionResult, ConversionStage, InputFile, TaskId,
};
use formatflow_processing::{ConversionEngine, StageObserver};
use std::panic::{self, AssertUnwindSafe};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Message sent to the worker thread.
#[derive(Debug)]
pub struct WorkerRequest {
    pub task_id: TaskId,
    pub input: InputFile,
    pub options: ConversionOptions,
    pub cancel: CancellationToken,
}

#[derive(Debug)]
pub enum WorkerEvent {
    Progress(u8),
    Finished(Result<ConversionResult, ConversionError>),
}

/// Message sent back from the worker thread.
#[derive(Debug)]
pub struct WorkerResponse {
    pub task_id: TaskId,
    pub event: WorkerEvent,
}

impl WorkerResponse {
    pub fn progress(task_id: TaskId, percent: u8) -> Self {
        Self {
            task_id,
            event: WorkerEvent::Progress(percent),
        }
    }

    pub fn finished(task_id: TaskId, result: Result<ConversionResult, ConversionError>) -> Self {
        Self {
            task_id,
            event: WorkerEvent::Finished(result),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.event, WorkerEvent::Finished(_))
    }
}

/// Worker thread body. Returns when the request channel closes or nobody is
/// listening for responses anymore.
pub(crate) fn run(
    mut requests: mpsc::UnboundedReceiver<WorkerRequest>,
    responses: mpsc::UnboundedSender<WorkerResponse>,
) {
    tracing::debug!("Conversion worker started");

    while let Some(request) = requests.blocking_recv() {
        let task_id = request.task_id;

        let result = if request.cancel.is_cancelled() {
            Err(ConversionError::Cancelled)
        } else {
            let mut observer = |stage: ConversionStage| -> Result<(), ConversionError> {
                if request.cancel.is_cancelled() {
                    return Err(ConversionError::Cancelled);
                }
                // The dispatcher going away is handled after the conversion returns
                let _ = responses.send(WorkerResponse::progress(task_id, stage.percent()));
                Ok(())
            };
            convert_isolated(&request.input, &request.options, &mut observer)
        };

        if let Err(e) = &result {
            tracing::debug!(task_id = %task_id, error = %e, "Conversion failed on worker");
        }

        if responses.send(WorkerResponse::finished(task_id, result)).is_err() {
            break;
        }
    }

    tracing::debug!("Conversion worker stopped");
}

/// Run the engine, turning a panic inside a codec into a failed conversion so
/// the thread survives for the next task.
fn convert_isolated<O: StageObserver + ?Sized>(
    input: &InputFile,
    options: &ConversionOptions,
    observer: &mut O,
) -> Result<ConversionResult, ConversionError> {
    panic::catch_unwind(AssertUnwindSafe(|| {
        ConversionEngine::convert_with_observer(input, options, observer)
    }))
    .unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        tracing::error!(name = %input.name, reason = %reason, "Conversion panicked");
        Err(ConversionError::DecodeFailed(format!("conversion panicked: {}", reason)))
    })
}
