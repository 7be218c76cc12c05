//! Exponential-backoff reconnection to the execution worker.
//!
//! When the link drops, the supervisor calls [`reconnect_loop`] to keep
//! retrying with increasing delays until either a link is restored or
//! the [`CancellationToken`] fires.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::{WorkerClient, WorkerConnection};
use crate::error::RelayError;

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Retry the worker with exponential backoff.
///
/// Every attempt is preceded by the current delay, so a link that drops
/// right after opening cannot spin. `on_failure` sees every failed
/// attempt. Returns `Some(connection)` once an attempt succeeds, or
/// `None` if `cancel` fires first.
pub async fn reconnect_loop(
    client: &WorkerClient,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
    mut on_failure: impl FnMut(&RelayError),
) -> Option<WorkerConnection> {
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(worker_url = client.ws_url(), "Reconnect cancelled");
                return None;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
        tracing::info!(
            worker_url = client.ws_url(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting to execution worker",
        );

        tokio::select! {
            _ = cancel.cancelled() => return None,
            result = client.connect() => match result {
                Ok(conn) => {
                    tracing::info!(
                        connection_id = %conn.connection_id,
                        attempt,
                        "Reconnected to execution worker",
                    );
                    return Some(conn);
                }
                Err(e) => {
                    tracing::warn!(
                        worker_url = client.ws_url(),
                        error = %e,
                        "Reconnect attempt {attempt} failed",
                    );
                    on_failure(&e);
                }
            }
        }

        delay = next_delay(delay, config);
    }
}
