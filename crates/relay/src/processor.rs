//! Receive loop for the worker link.
//!
//! Reads frames from the read half of the link and feeds every text
//! frame to the [`ResultCorrelator`]. Anomalous frames are logged by the
//! correlator and never end the loop; only a close, a receive error, the
//! end of the stream or the link's stop token do.

use futures::stream::SplitStream;
use futures::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::client::WsStream;
use crate::correlator::ResultCorrelator;

/// Process inbound frames until the link ends.
///
/// Returns the reason the link went down, or `None` when `stop` fired
/// (local teardown or shutdown).
pub async fn process_messages(
    mut stream: SplitStream<WsStream>,
    connection_id: &str,
    correlator: &ResultCorrelator,
    stop: &CancellationToken,
) -> Option<String> {
    loop {
        let next = tokio::select! {
            _ = stop.cancelled() => return None,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                correlator.handle_text(&text).await;
            }
            Some(Ok(Message::Binary(data))) => {
                tracing::warn!(
                    connection_id,
                    bytes = data.len(),
                    "Ignoring binary frame from worker",
                );
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                // Handled automatically by tungstenite.
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(connection_id, ?frame, "Worker closed the connection");
                return Some("worker closed the connection".to_string());
            }
            Some(Ok(Message::Frame(_))) => {}
            Some(Err(e)) => {
                tracing::error!(connection_id, error = %e, "WebSocket receive error");
                return Some(format!("receive error: {e}"));
            }
            None => {
                tracing::info!(connection_id, "Worker stream ended");
                return Some("worker stream ended".to_string());
            }
        }
    }
}
