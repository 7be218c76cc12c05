//! Execution request and result types.
//!
//! An [`ExecutionResult`] is created `Pending` when its request is
//! submitted and moves to exactly one terminal state. The transition
//! methods here are the only way to change it; each returns `false` and
//! leaves the result untouched once it is terminal.

use chrono::Utc;
use devspace_core::types::{DocId, Timestamp};
use serde::Serialize;
use uuid::Uuid;

/// Correlation id shared by a request, its result and the worker's replies.
pub type RequestId = Uuid;

/// A request to run one file on the worker. Immutable once created.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub id: RequestId,
    pub file_id: DocId,
    pub filename: String,
    pub language: String,
    pub content: String,
    pub submitted_at: Timestamp,
}

impl ExecutionRequest {
    pub fn new(
        file_id: DocId,
        filename: impl Into<String>,
        language: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_id,
            filename: filename.into(),
            language: language.into(),
            content: content.into(),
            submitted_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Accepted and waiting in the dispatch queue.
    Pending,
    /// Written to the worker link; awaiting the worker's verdict.
    Sent,
    Completed,
    Failed,
    TimedOut,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::TimedOut
        )
    }
}

/// Why a result ended up `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The worker was unreachable or the link broke during the send.
    Connection,
    /// No link existed at send time.
    NotConnected,
    /// The worker ran the file and reported a failure.
    Worker,
    /// The request could not be encoded for the wire.
    Protocol,
    /// The relay shut down before the request was sent.
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// Tracked outcome of one [`ExecutionRequest`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub request_id: RequestId,
    pub file_id: DocId,
    pub status: ExecutionStatus,
    /// Everything the worker printed, in arrival order.
    pub output: String,
    pub exit_code: Option<i32>,
    pub failure: Option<ExecutionFailure>,
    pub submitted_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl ExecutionResult {
    pub fn pending(request: &ExecutionRequest) -> Self {
        Self {
            request_id: request.id,
            file_id: request.file_id,
            status: ExecutionStatus::Pending,
            output: String::new(),
            exit_code: None,
            failure: None,
            submitted_at: request.submitted_at,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub(crate) fn mark_sent(&mut self) -> bool {
        if self.status != ExecutionStatus::Pending {
            return false;
        }
        self.status = ExecutionStatus::Sent;
        true
    }

    pub(crate) fn append_output(&mut self, chunk: &str) -> bool {
        if self.is_terminal() || chunk.is_empty() {
            return false;
        }
        push_line(&mut self.output, chunk);
        true
    }

    pub(crate) fn complete(&mut self, output: Option<&str>, exit_code: Option<i32>) -> bool {
        if self.is_terminal() {
            return false;
        }
        if let Some(chunk) = output.filter(|c| !c.is_empty()) {
            push_line(&mut self.output, chunk);
        }
        self.exit_code = exit_code;
        self.finish(ExecutionStatus::Completed);
        true
    }

    pub(crate) fn fail(&mut self, failure: ExecutionFailure, exit_code: Option<i32>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.failure = Some(failure);
        self.exit_code = exit_code;
        self.finish(ExecutionStatus::Failed);
        true
    }

    pub(crate) fn time_out(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.finish(ExecutionStatus::TimedOut);
        true
    }

    fn finish(&mut self, status: ExecutionStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }
}

fn push_line(buf: &mut String, chunk: &str) {
    if !buf.is_empty() && !buf.ends_with('\n') {
        buf.push('\n');
    }
    buf.push_str(chunk);
}
