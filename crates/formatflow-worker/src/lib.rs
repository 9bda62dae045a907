//! Conversion task queue
//!
//! Serializes conversions onto one dedicated background thread and routes
//! progress and results back to the caller that submitted each task.
//!
//! Shutdown: [`ConversionQueue::shutdown`] (or dropping the queue) stops the
//! dispatcher immediately. Outstanding handles resolve to
//! [`QueueError::ShutDown`]; the worker thread exits once its current
//! conversion returns.

pub mod dispatch;
pub mod error;
pub mod queue;
mod worker;

pub use dispatch::{DispatchState, QueuedTask, ResponseOutcome};
pub use error::QueueError;
pub use queue::{ConversionQueue, TaskHandle};
pub use worker::{WorkerEvent, WorkerRequest, WorkerResponse};
