//! The single persistent link to the execution worker.
//!
//! [`ConnectionManager`] owns at most one live WebSocket link. A
//! supervisor task runs the receive loop for the current link and, when
//! it drops, reconnects with exponential backoff. Link state is
//! published on a [`watch`] channel so the dispatch queue can wait for
//! the link without polling.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::client::{WorkerClient, WorkerConnection, WsStream};
use crate::correlator::ResultCorrelator;
use crate::error::RelayError;
use crate::events::RelayEvent;
use crate::processor::process_messages;
use crate::reconnect::{reconnect_loop, ReconnectConfig};

/// Snapshot of the link, as seen by callers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStatus {
    pub connected: bool,
    pub connection_id: Option<String>,
    /// The most recent connect, send or receive failure.
    pub last_error: Option<String>,
}

/// Write half of the live link.
struct ActiveLink {
    connection_id: String,
    sink: SplitSink<WsStream, Message>,
    /// Stops this link's receive loop.
    stop: CancellationToken,
}

/// Read half handed to the supervisor.
struct LiveLink {
    connection_id: String,
    stream: SplitStream<WsStream>,
    stop: CancellationToken,
}

pub struct ConnectionManager {
    client: WorkerClient,
    reconnect: ReconnectConfig,
    send_timeout: Duration,
    link: Mutex<Option<ActiveLink>>,
    status_tx: watch::Sender<LinkStatus>,
    correlator: Arc<ResultCorrelator>,
    event_tx: broadcast::Sender<RelayEvent>,
    cancel: CancellationToken,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    pub fn new(
        client: WorkerClient,
        reconnect: ReconnectConfig,
        send_timeout: Duration,
        correlator: Arc<ResultCorrelator>,
        event_tx: broadcast::Sender<RelayEvent>,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        let (status_tx, _) = watch::channel(LinkStatus::default());
        Arc::new(Self {
            client,
            reconnect,
            send_timeout,
            link: Mutex::new(None),
            status_tx,
            correlator,
            event_tx,
            cancel,
            supervisor: Mutex::new(None),
        })
    }

    /// Establish the link and start the supervisor that keeps it alive.
    ///
    /// Returns [`RelayError::Connection`] if the worker is unreachable;
    /// the supervisor keeps retrying in the background either way.
    /// Calling this again only reports the current link state.
    pub async fn connect(self: &Arc<Self>) -> Result<(), RelayError> {
        let mut supervisor = self.supervisor.lock().await;
        if supervisor.is_some() {
            let status = self.status();
            if status.connected {
                return Ok(());
            }
            return Err(RelayError::Connection(
                status
                    .last_error
                    .unwrap_or_else(|| "worker link is reconnecting".to_string()),
            ));
        }
        if self.cancel.is_cancelled() {
            return Err(RelayError::Connection("relay is shut down".to_string()));
        }

        let (initial, result) = match self.client.connect().await {
            Ok(conn) => (Some(self.install(conn).await), Ok(())),
            Err(e) => {
                tracing::warn!(
                    worker_url = self.client.ws_url(),
                    error = %e,
                    "Initial connection to worker failed, retrying in background",
                );
                self.record_failure(&e);
                (None, Err(e))
            }
        };

        let this = Arc::clone(self);
        *supervisor = Some(tokio::spawn(async move {
            this.run_link_loop(initial).await;
        }));
        result
    }

    /// Write one text frame to the worker.
    ///
    /// Returns the id of the link the frame went out on. Fails fast with
    /// [`RelayError::NotConnected`] when there is no link. A failed or
    /// timed-out write drops the link and hands it to the supervisor for
    /// reconnection.
    pub async fn send(&self, payload: String) -> Result<String, RelayError> {
        let mut guard = self.link.lock().await;
        let link = guard.as_mut().ok_or(RelayError::NotConnected)?;

        let err = match tokio::time::timeout(self.send_timeout, link.sink.send(Message::Text(payload)))
            .await
        {
            Ok(Ok(())) => return Ok(link.connection_id.clone()),
            Ok(Err(e)) => RelayError::Connection(format!("Send to worker failed: {e}")),
            Err(_) => RelayError::Timeout(format!(
                "Send to worker exceeded {}ms",
                self.send_timeout.as_millis()
            )),
        };

        if let Some(link) = guard.take() {
            tracing::warn!(
                connection_id = %link.connection_id,
                error = %err,
                "Dropping worker link after failed send",
            );
            link.stop.cancel();
        }
        drop(guard);

        self.record_failure(&err);
        Err(err)
    }

    pub fn is_connected(&self) -> bool {
        self.status_tx.borrow().connected
    }

    pub fn status(&self) -> LinkStatus {
        self.status_tx.borrow().clone()
    }

    /// Wait up to `timeout` for a live link. Returns whether one exists.
    pub async fn wait_connected(&self, timeout: Duration) -> bool {
        self.wait_connected_until(Instant::now() + timeout).await
    }

    pub async fn wait_connected_until(&self, deadline: Instant) -> bool {
        let mut rx = self.status_tx.subscribe();
        tokio::time::timeout_at(deadline, async move {
            rx.wait_for(|s| s.connected).await.is_ok()
        })
        .await
        .unwrap_or(false)
    }

    /// Resolve once `connection_id` is no longer the live link.
    ///
    /// A reply for a frame sent on a dead link can never arrive; a new
    /// link does not inherit it.
    pub async fn link_lost(&self, connection_id: &str) {
        let mut rx = self.status_tx.subscribe();
        let _ = rx
            .wait_for(|s| !s.connected || s.connection_id.as_deref() != Some(connection_id))
            .await;
    }

    /// Stop the supervisor and close the link.
    ///
    /// Waits up to 5 seconds for the supervisor to exit.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.supervisor.lock().await.take();
        if let Some(handle) = handle {
            if tokio::time::timeout(Duration::from_secs(5), handle).await.is_err() {
                tracing::warn!("Worker link supervisor did not stop within 5s");
            }
        }
    }

    // ---- private helpers ----

    /// Supervisor: receive loop for the current link, then reconnect.
    ///
    /// Runs until the cancellation token is triggered.
    async fn run_link_loop(self: Arc<Self>, mut live: Option<LiveLink>) {
        loop {
            let link = match live.take() {
                Some(link) => link,
                None => {
                    let conn = reconnect_loop(&self.client, &self.reconnect, &self.cancel, |e| {
                        self.record_failure(e)
                    })
                    .await;
                    match conn {
                        Some(conn) => self.install(conn).await,
                        None => break,
                    }
                }
            };

            let reason =
                process_messages(link.stream, &link.connection_id, &self.correlator, &link.stop)
                    .await;
            self.teardown(&link.connection_id, reason).await;

            if self.cancel.is_cancelled() {
                break;
            }
            tracing::info!(connection_id = %link.connection_id, "Worker link lost, entering reconnect loop");
        }
        tracing::info!("Worker link supervisor exited");
    }

    /// Make `conn` the live link and announce it.
    async fn install(&self, conn: WorkerConnection) -> LiveLink {
        let WorkerConnection {
            connection_id,
            ws_stream,
        } = conn;
        let (sink, stream) = ws_stream.split();
        let stop = self.cancel.child_token();

        *self.link.lock().await = Some(ActiveLink {
            connection_id: connection_id.clone(),
            sink,
            stop: stop.clone(),
        });
        self.status_tx.send_modify(|s| {
            s.connected = true;
            s.connection_id = Some(connection_id.clone());
            s.last_error = None;
        });
        let _ = self.event_tx.send(RelayEvent::WorkerConnected {
            connection_id: connection_id.clone(),
        });

        LiveLink {
            connection_id,
            stream,
            stop,
        }
    }

    /// Close the write half of `connection_id` (unless the send path
    /// already took it) and publish the disconnect.
    async fn teardown(&self, connection_id: &str, reason: Option<String>) {
        let taken = {
            let mut guard = self.link.lock().await;
            let current = guard
                .as_ref()
                .is_some_and(|link| link.connection_id == connection_id);
            if current {
                guard.take()
            } else {
                None
            }
        };
        if let Some(mut link) = taken {
            link.stop.cancel();
            let _ = tokio::time::timeout(self.send_timeout, link.sink.close()).await;
        }

        self.status_tx.send_modify(|s| {
            s.connected = false;
            s.connection_id = None;
            if let Some(reason) = &reason {
                s.last_error = Some(reason.clone());
            }
        });
        tracing::info!(connection_id, reason = ?reason, "Worker link closed");
        let _ = self.event_tx.send(RelayEvent::WorkerDisconnected {
            connection_id: connection_id.to_string(),
            reason,
        });
    }

    fn record_failure(&self, err: &RelayError) {
        self.status_tx.send_modify(|s| {
            s.connected = false;
            s.connection_id = None;
            s.last_error = Some(err.to_string());
        });
    }
}
