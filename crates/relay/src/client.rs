//! WebSocket client for the execution worker.
//!
//! [`WorkerClient`] holds the worker address and dial timeout. Call
//! [`WorkerClient::connect`] to establish a live [`WorkerConnection`].

use std::time::Duration;

use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::RelayError;

/// The raw WebSocket stream to the worker.
pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Dial configuration for the execution worker.
#[derive(Debug, Clone)]
pub struct WorkerClient {
    ws_url: String,
    connect_timeout: Duration,
}

/// A freshly opened WebSocket link to the worker.
#[derive(Debug)]
pub struct WorkerConnection {
    /// Random id tagging this link in logs and events.
    pub connection_id: String,
    pub ws_stream: WsStream,
}

impl WorkerClient {
    /// * `ws_url`          - full endpoint, e.g. `ws://127.0.0.1:8000/ws`.
    /// * `connect_timeout` - upper bound on the TCP + handshake phase.
    pub fn new(ws_url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            ws_url: ws_url.into(),
            connect_timeout,
        }
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Open a new WebSocket link to the worker.
    pub async fn connect(&self) -> Result<WorkerConnection, RelayError> {
        let dial = connect_async(self.ws_url.as_str());
        let (ws_stream, _response) = tokio::time::timeout(self.connect_timeout, dial)
            .await
            .map_err(|_| {
                RelayError::Connection(format!(
                    "Connecting to worker at {} timed out after {}ms",
                    self.ws_url,
                    self.connect_timeout.as_millis()
                ))
            })?
            .map_err(|e| {
                RelayError::Connection(format!(
                    "Failed to connect to worker at {}: {e}",
                    self.ws_url
                ))
            })?;

        let connection_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(
            connection_id = %connection_id,
            "Connected to execution worker at {}",
            self.ws_url,
        );

        Ok(WorkerConnection {
            connection_id,
            ws_stream,
        })
    }
}
