//! Relay facade.
//!
//! [`RelayManager`] wires the [`ConnectionManager`], [`ResultCorrelator`]
//! and [`DispatchQueue`] together. It is created once at application
//! startup via [`RelayManager::start`], cloned into request handlers as
//! an `Arc`, and shut down when the process exits.
//!
//! Relay events are broadcast via a [`tokio::sync::broadcast`] channel.
//! Call [`RelayManager::subscribe`] to receive them.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::WorkerClient;
use crate::connection::{ConnectionManager, LinkStatus};
use crate::correlator::ResultCorrelator;
use crate::dispatch::{DispatchQueue, ExecutionHandle};
use crate::error::RelayError;
use crate::events::RelayEvent;
use crate::execution::{ExecutionRequest, ExecutionResult, RequestId};
use crate::reconnect::ReconnectConfig;

/// Broadcast channel capacity for relay events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How often finished results are checked against the retention window.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Relay tuning, normally built from the environment by the API server.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Worker endpoint, e.g. `ws://127.0.0.1:8000/ws`.
    pub worker_url: String,
    /// Bound on one dial attempt (TCP + WebSocket handshake).
    pub connect_timeout: Duration,
    /// Bound on one frame write.
    pub send_timeout: Duration,
    /// Per-request deadline, measured from submission.
    pub request_timeout: Duration,
    /// How long a dequeued request waits for a dropped link to return.
    pub connect_wait: Duration,
    pub reconnect: ReconnectConfig,
    /// How long terminal results stay pollable.
    pub result_retention: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            worker_url: "ws://127.0.0.1:8000/ws".to_string(),
            connect_timeout: Duration::from_secs(5),
            send_timeout: Duration::from_millis(5000),
            request_timeout: Duration::from_secs(30),
            connect_wait: Duration::from_millis(2000),
            reconnect: ReconnectConfig::default(),
            result_retention: Duration::from_secs(3600),
        }
    }
}

pub struct RelayManager {
    connection: Arc<ConnectionManager>,
    correlator: Arc<ResultCorrelator>,
    queue: DispatchQueue,
    event_tx: broadcast::Sender<RelayEvent>,
    /// Master cancellation token -- cancelled during shutdown.
    cancel: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl RelayManager {
    /// Connect to the worker and start the dispatch and retention tasks.
    ///
    /// An unreachable worker is logged, not fatal: the link supervisor
    /// keeps retrying and requests fail individually until it returns.
    pub async fn start(config: RelayConfig) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let correlator = Arc::new(ResultCorrelator::new(event_tx.clone()));

        let connection = ConnectionManager::new(
            WorkerClient::new(config.worker_url.clone(), config.connect_timeout),
            config.reconnect.clone(),
            config.send_timeout,
            Arc::clone(&correlator),
            event_tx.clone(),
            cancel.child_token(),
        );
        if let Err(e) = connection.connect().await {
            tracing::warn!(
                worker_url = %config.worker_url,
                error = %e,
                "Execution worker unavailable at startup",
            );
        }

        let queue = DispatchQueue::start(
            Arc::clone(&connection),
            Arc::clone(&correlator),
            event_tx.clone(),
            config.request_timeout,
            config.connect_wait,
            cancel.child_token(),
        );

        let sweeper = tokio::spawn(run_sweeper(
            Arc::clone(&correlator),
            config.result_retention,
            cancel.child_token(),
        ));

        tracing::info!(worker_url = %config.worker_url, "Execution relay started");

        Arc::new(Self {
            connection,
            correlator,
            queue,
            event_tx,
            cancel,
            sweeper: Mutex::new(Some(sweeper)),
        })
    }

    /// Subscribe to relay events.
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.event_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn link_status(&self) -> LinkStatus {
        self.connection.status()
    }

    /// Wait up to `timeout` for the worker link to come up.
    pub async fn wait_connected(&self, timeout: Duration) -> bool {
        self.connection.wait_connected(timeout).await
    }

    /// Queue a request for execution. The returned handle carries its id.
    pub async fn submit(&self, request: ExecutionRequest) -> Result<ExecutionHandle, RelayError> {
        self.queue.submit(request).await
    }

    /// Poll the result of a previously submitted request.
    ///
    /// `None` if the id was never issued or its result has been pruned.
    pub async fn get_result(&self, request_id: RequestId) -> Option<ExecutionResult> {
        self.correlator.get(request_id).await
    }

    /// Gracefully stop the relay.
    ///
    /// Queued requests fail with kind `shutdown`; the link is closed.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down execution relay");
        self.cancel.cancel();

        self.queue.shutdown().await;
        self.connection.shutdown().await;
        if let Some(handle) = self.sweeper.lock().await.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }

        tracing::info!("Execution relay shut down complete");
    }
}

/// Periodically time out overdue results and prune old terminal ones.
async fn run_sweeper(
    correlator: Arc<ResultCorrelator>,
    retention: Duration,
    cancel: CancellationToken,
) {
    let period = SWEEP_INTERVAL.min(retention).max(Duration::from_secs(1));
    let mut interval = tokio::time::interval(period);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let stats = correlator.sweep(retention).await;
                if stats.timed_out > 0 || stats.pruned > 0 {
                    tracing::debug!(
                        timed_out = stats.timed_out,
                        pruned = stats.pruned,
                        "Swept execution results",
                    );
                }
            }
        }
    }
}
