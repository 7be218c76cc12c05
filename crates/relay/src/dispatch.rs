//! FIFO dispatch of execution requests over the single worker link.
//!
//! Callers [`submit`](DispatchQueue::submit) from any task; one consumer
//! task takes requests in submission order and holds the link for each
//! until its result is terminal or its deadline passes. If that link drops
//! first, the request fails at once. Every failure on the way is recorded
//! on the request's result. Nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::connection::ConnectionManager;
use crate::correlator::ResultCorrelator;
use crate::error::RelayError;
use crate::events::RelayEvent;
use crate::execution::{
    ExecutionFailure, ExecutionRequest, ExecutionResult, FailureKind, RequestId,
};
use crate::messages::encode_request;

struct Job {
    request: ExecutionRequest,
    deadline: Instant,
}

/// Caller-side view of one submitted request.
pub struct ExecutionHandle {
    request_id: RequestId,
    deadline: Instant,
    rx: watch::Receiver<ExecutionResult>,
    correlator: Arc<ResultCorrelator>,
}

impl ExecutionHandle {
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// The result as it stands now.
    pub fn current(&self) -> ExecutionResult {
        self.rx.borrow().clone()
    }

    /// Wait for the terminal result, at most until the deadline.
    pub async fn wait(mut self) -> ExecutionResult {
        let finished = tokio::time::timeout_at(self.deadline, async {
            self.rx
                .wait_for(ExecutionResult::is_terminal)
                .await
                .map(|r| (*r).clone())
                .ok()
        })
        .await
        .ok()
        .flatten();

        if let Some(result) = finished {
            return result;
        }
        self.correlator.time_out(self.request_id).await;
        let current = self.rx.borrow().clone();
        current
    }
}

pub struct DispatchQueue {
    tx: mpsc::UnboundedSender<Job>,
    correlator: Arc<ResultCorrelator>,
    request_timeout: Duration,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DispatchQueue {
    /// Spawn the consumer task and return the queue handle.
    pub fn start(
        connection: Arc<ConnectionManager>,
        correlator: Arc<ResultCorrelator>,
        event_tx: broadcast::Sender<RelayEvent>,
        request_timeout: Duration,
        connect_wait: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher {
            connection,
            correlator: Arc::clone(&correlator),
            event_tx,
            connect_wait,
            cancel: cancel.clone(),
        };
        let worker = tokio::spawn(dispatcher.run(rx));

        Self {
            tx,
            correlator,
            request_timeout,
            cancel,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Register `request` as `Pending` and queue it for dispatch.
    ///
    /// The deadline runs from this call. Never blocks on the worker.
    pub async fn submit(&self, request: ExecutionRequest) -> Result<ExecutionHandle, RelayError> {
        if self.cancel.is_cancelled() {
            return Err(RelayError::QueueClosed);
        }

        let request_id = request.id;
        let deadline = Instant::now() + self.request_timeout;
        let rx = self.correlator.register(&request, deadline).await;

        if self.tx.send(Job { request, deadline }).is_err() {
            self.correlator
                .fail(request_id, shutdown_failure())
                .await;
            return Err(RelayError::QueueClosed);
        }
        tracing::debug!(request_id = %request_id, "Execution queued");

        Ok(ExecutionHandle {
            request_id,
            deadline,
            rx,
            correlator: Arc::clone(&self.correlator),
        })
    }

    /// Stop the consumer and fail everything still queued.
    ///
    /// Waits up to 5 seconds for the consumer to drain.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            if tokio::time::timeout(Duration::from_secs(5), handle).await.is_err() {
                tracing::warn!("Dispatch queue did not drain within 5s");
            }
        }
    }
}

/// The single consumer of the queue.
struct Dispatcher {
    connection: Arc<ConnectionManager>,
    correlator: Arc<ResultCorrelator>,
    event_tx: broadcast::Sender<RelayEvent>,
    connect_wait: Duration,
    cancel: CancellationToken,
}

impl Dispatcher {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<Job>) {
        tracing::info!("Dispatch queue started");

        loop {
            let job = tokio::select! {
                _ = self.cancel.cancelled() => break,
                job = rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            self.dispatch(job).await;
        }

        rx.close();
        let mut drained = 0usize;
        while let Ok(job) = rx.try_recv() {
            self.correlator.fail(job.request.id, shutdown_failure()).await;
            drained += 1;
        }
        tracing::info!(drained, "Dispatch queue stopped");
    }

    async fn dispatch(&self, job: Job) {
        let id = job.request.id;

        // `get` times out anything whose deadline passed while queued.
        match self.correlator.get(id).await {
            Some(result) if !result.is_terminal() => {}
            Some(result) => {
                tracing::debug!(request_id = %id, status = ?result.status, "Skipping request finished while queued");
                return;
            }
            None => return,
        }

        let payload = match encode_request(&job.request) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(request_id = %id, error = %e, "Failed to encode request");
                self.correlator.fail(id, ExecutionFailure::from(&e)).await;
                return;
            }
        };

        if !self.connection.is_connected() {
            let wait_until = (Instant::now() + self.connect_wait).min(job.deadline);
            let connected = tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.correlator.fail(id, shutdown_failure()).await;
                    return;
                }
                connected = self.connection.wait_connected_until(wait_until) => connected,
            };

            if !connected {
                if Instant::now() >= job.deadline {
                    self.correlator.time_out(id).await;
                    return;
                }
                let reason = self
                    .connection
                    .status()
                    .last_error
                    .unwrap_or_else(|| "no live connection".to_string());
                tracing::warn!(request_id = %id, reason = %reason, "Worker unreachable, failing request");
                self.correlator
                    .fail(
                        id,
                        ExecutionFailure {
                            kind: FailureKind::Connection,
                            message: format!("Worker unreachable: {reason}"),
                        },
                    )
                    .await;
                return;
            }
        }

        let connection_id = match self.connection.send(payload).await {
            Ok(connection_id) => connection_id,
            Err(e) => {
                tracing::warn!(request_id = %id, error = %e, "Send to worker failed");
                self.correlator.fail(id, ExecutionFailure::from(&e)).await;
                return;
            }
        };
        self.correlator.mark_sent(id).await;
        let _ = self.event_tx.send(RelayEvent::ExecutionSent { request_id: id });
        tracing::info!(
            request_id = %id,
            connection_id = %connection_id,
            file_id = %job.request.file_id,
            language = %job.request.language,
            "Execution sent to worker",
        );

        // Hold the link until the worker answers, the link the request went
        // out on drops, or the deadline passes.
        let Some(mut rx) = self.correlator.subscribe(id).await else {
            return;
        };
        let finished = tokio::time::timeout_at(job.deadline, async move {
            rx.wait_for(ExecutionResult::is_terminal).await.is_ok()
        });

        tokio::select! {
            _ = self.cancel.cancelled() => {
                self.correlator.fail(id, shutdown_failure()).await;
            }
            outcome = finished => {
                if !outcome.unwrap_or(false) {
                    self.correlator.time_out(id).await;
                }
            }
            _ = self.connection.link_lost(&connection_id) => {
                tracing::warn!(
                    request_id = %id,
                    connection_id = %connection_id,
                    "Worker link lost while request was in flight",
                );
                // No-op if the reply landed just before the link closed.
                self.correlator.fail(id, link_lost_failure()).await;
            }
        }
    }
}

fn link_lost_failure() -> ExecutionFailure {
    ExecutionFailure {
        kind: FailureKind::Connection,
        message: "Worker link lost after send".to_string(),
    }
}

fn shutdown_failure() -> ExecutionFailure {
    ExecutionFailure {
        kind: FailureKind::Shutdown,
        message: "Relay shut down before the request completed".to_string(),
    }
}
