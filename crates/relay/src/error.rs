use crate::execution::{ExecutionFailure, FailureKind};

/// Errors raised by the relay's connection and dispatch paths.
///
/// None of these escape as panics: the dispatch queue converts every one
/// of them into a terminal [`ExecutionResult`](crate::execution::ExecutionResult).
#[derive(Debug, Clone, thiserror::Error)]
pub enum RelayError {
    /// The worker could not be reached or the link broke mid-write.
    #[error("Connection error: {0}")]
    Connection(String),

    /// No live link exists right now.
    #[error("Not connected to the execution worker")]
    NotConnected,

    /// An operation did not finish within its time budget.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// A frame could not be encoded or decoded.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The dispatch queue has shut down and accepts no more requests.
    #[error("Dispatch queue is closed")]
    QueueClosed,
}

impl RelayError {
    /// The failure category recorded on a result failed by this error.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            RelayError::Connection(_) | RelayError::Timeout(_) => FailureKind::Connection,
            RelayError::NotConnected => FailureKind::NotConnected,
            RelayError::Protocol(_) => FailureKind::Protocol,
            RelayError::QueueClosed => FailureKind::Shutdown,
        }
    }
}

impl From<&RelayError> for ExecutionFailure {
    fn from(err: &RelayError) -> Self {
        ExecutionFailure {
            kind: err.failure_kind(),
            message: err.to_string(),
        }
    }
}
