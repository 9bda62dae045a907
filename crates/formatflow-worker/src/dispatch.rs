//! Dispatcher state machine
//!
//! Holds the FIFO of queued tasks and the single active slot. Each task moves
//! queued → running → done | error; only the active task's id is accepted on
//! the response path. Pure bookkeeping: the queue's async loop feeds it
//! submissions and worker responses and sends whatever request it yields.

use std::collections::VecDeque;

use formatflow_core::{ConversionError, ConversionOptions, ConversionResult, InputFile, TaskId};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::QueueError;
use crate::worker::{WorkerEvent, WorkerRequest, WorkerResponse};

pub(crate) type ResultSender = oneshot::Sender<Result<ConversionResult, QueueError>>;

/// A submitted task together with the channels back to its caller.
#[derive(Debug)]
pub struct QueuedTask {
    pub id: TaskId,
    pub input: InputFile,
    pub options: ConversionOptions,
    pub cancel: CancellationToken,
    pub(crate) progress_tx: mpsc::UnboundedSender<u8>,
    pub(crate) result_tx: ResultSender,
}

impl QueuedTask {
    fn resolve(self, result: Result<ConversionResult, QueueError>) {
        // The caller may have dropped its handle already
        let _ = self.result_tx.send(result);
    }
}

/// The running task: its id and the caller channels. Input and options have
/// moved to the worker.
#[derive(Debug)]
struct ActiveTask {
    id: TaskId,
    progress_tx: mpsc::UnboundedSender<u8>,
    result_tx: ResultSender,
}

/// What a worker response did to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Progress forwarded to the active task's caller.
    Progress,
    /// Active task resolved; the slot is free again.
    Completed,
    /// Response for an id that is not the active task. Dropped.
    Stale,
}

#[derive(Debug, Default)]
pub struct DispatchState {
    pending: VecDeque<QueuedTask>,
    active: Option<ActiveTask>,
}

impl DispatchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, task: QueuedTask) {
        tracing::debug!(task_id = %task.id, pending = self.pending.len(), "Task queued");
        self.pending.push_back(task);
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_none()
    }

    pub fn active_id(&self) -> Option<TaskId> {
        self.active.as_ref().map(|a| a.id)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// If idle, take the head of the queue and return the request to send to
    /// the worker. Tasks cancelled while queued resolve as cancelled here and
    /// never reach the worker.
    pub fn next_request(&mut self) -> Option<WorkerRequest> {
        if self.active.is_some() {
            return None;
        }

        while let Some(task) = self.pending.pop_front() {
            if task.cancel.is_cancelled() {
                tracing::debug!(task_id = %task.id, "Skipping task cancelled while queued");
                task.resolve(Err(ConversionError::Cancelled.into()));
                continue;
            }

            let QueuedTask {
                id,
                input,
                options,
                cancel,
                progress_tx,
                result_tx,
            } = task;

            self.active = Some(ActiveTask {
                id,
                progress_tx,
                result_tx,
            });
            tracing::debug!(task_id = %id, "Task dispatched to worker");

            return Some(WorkerRequest {
                task_id: id,
                input,
                options,
                cancel,
            });
        }

        None
    }

    /// Apply a worker response. Anything not tagged with the active id is
    /// ignored.
    pub fn on_response(&mut self, response: WorkerResponse) -> ResponseOutcome {
        let is_active = self
            .active
            .as_ref()
            .map(|a| a.id == response.task_id)
            .unwrap_or(false);

        if !is_active {
            tracing::debug!(
                task_id = %response.task_id,
                active = ?self.active_id(),
                "Ignoring response for inactive task"
            );
            return ResponseOutcome::Stale;
        }

        match response.event {
            WorkerEvent::Progress(percent) => {
                if let Some(active) = &self.active {
                    let _ = active.progress_tx.send(percent);
                }
                ResponseOutcome::Progress
            }
            WorkerEvent::Finished(result) => {
                self.finish_active(result.map_err(QueueError::from));
                ResponseOutcome::Completed
            }
        }
    }

    /// Fail the active task without a worker response (the worker could not be
    /// reached).
    pub fn fail_active(&mut self, error: QueueError) {
        self.finish_active(Err(error));
    }

    fn finish_active(&mut self, result: Result<ConversionResult, QueueError>) {
        if let Some(active) = self.active.take() {
            match &result {
                Ok(r) => tracing::debug!(task_id = %active.id, size = r.size_bytes, "Task done"),
                Err(e) => tracing::debug!(task_id = %active.id, error = %e, "Task errored"),
            }
            // Dropping progress_tx after the result closes the caller's stream
            let _ = active.result_tx.send(result);
        }
    }

    /// Discard pending and active state, resolving every caller with `ShutDown`.
    pub fn drain(&mut self) {
        if let Some(active) = self.active.take() {
            let _ = active.result_tx.send(Err(QueueError::ShutDown));
        }
        for task in self.pending.drain(..) {
            task.resolve(Err(QueueError::ShutDown));
        }
    }
}
