//! Relay events broadcast to subscribers.
//!
//! Emitted on link transitions and when an execution reaches a terminal
//! state. Subscribe through [`RelayManager::subscribe`](crate::manager::RelayManager::subscribe).

use serde::Serialize;

use crate::execution::{ExecutionStatus, RequestId};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    /// A link to the worker was established.
    WorkerConnected { connection_id: String },

    /// The link to the worker was lost or closed.
    WorkerDisconnected {
        connection_id: String,
        reason: Option<String>,
    },

    /// A request was written to the worker link.
    ExecutionSent { request_id: RequestId },

    /// A request reached a terminal state.
    ExecutionFinished {
        request_id: RequestId,
        status: ExecutionStatus,
    },
}
