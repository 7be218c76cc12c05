//! Wire messages exchanged with the execution worker.
//!
//! Both directions are JSON text frames with camelCase keys. Outbound:
//!
//! ```json
//! {"requestId": "...", "fileId": "...", "filename": "main.py", "language": "python", "content": "print(1)"}
//! ```
//!
//! Inbound, zero or more `output` chunks followed by one terminal frame:
//!
//! ```json
//! {"requestId": "...", "status": "output", "output": "1"}
//! {"requestId": "...", "status": "completed", "output": "", "exitCode": 0}
//! ```

use devspace_core::types::DocId;
use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::execution::{ExecutionRequest, RequestId};

/// The frame sent to the worker for one execution.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteMessage<'a> {
    pub request_id: RequestId,
    pub file_id: DocId,
    pub filename: &'a str,
    pub language: &'a str,
    pub content: &'a str,
}

impl<'a> From<&'a ExecutionRequest> for ExecuteMessage<'a> {
    fn from(request: &'a ExecutionRequest) -> Self {
        Self {
            request_id: request.id,
            file_id: request.file_id,
            filename: &request.filename,
            language: &request.language,
            content: &request.content,
        }
    }
}

/// Serialize a request into the outbound text frame.
pub fn encode_request(request: &ExecutionRequest) -> Result<String, RelayError> {
    serde_json::to_string(&ExecuteMessage::from(request))
        .map_err(|e| RelayError::Protocol(format!("Failed to encode request: {e}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    /// A chunk of program output; more frames follow.
    Output,
    /// The program ran to completion.
    Completed,
    /// The worker could not run the program, or it failed.
    Failed,
}

impl WorkerStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, WorkerStatus::Output)
    }
}

/// A frame received from the worker.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerMessage {
    pub request_id: RequestId,
    pub status: WorkerStatus,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub exit_code: Option<i32>,
}

/// Parse an inbound text frame.
///
/// Returns [`RelayError::Protocol`] for malformed JSON, a missing or
/// non-UUID `requestId`, or an unknown `status`. Callers log and move on.
pub fn parse_message(text: &str) -> Result<WorkerMessage, RelayError> {
    serde_json::from_str(text).map_err(|e| RelayError::Protocol(e.to_string()))
}
