use formatflow_core::ConversionError;

/// Errors surfaced through the conversion queue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The background execution context could not be started or reached.
    #[error("Failed to dispatch conversion: {0}")]
    DispatchFailed(String),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// The queue was torn down before the task resolved.
    #[error("Conversion queue shut down")]
    ShutDown,
}

impl QueueError {
    pub fn error_code(&self) -> &'static str {
        match self {
            QueueError::DispatchFailed(_) => "DISPATCH_FAILED",
            QueueError::Conversion(e) => e.error_code(),
            QueueError::ShutDown => "QUEUE_SHUT_DOWN",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, QueueError::Conversion(e) if e.is_cancelled())
    }
}
