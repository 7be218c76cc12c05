//! Periodic purge of expired and revoked sessions.

use std::time::Duration;

use chrono::Utc;
use devspace_db::repositories::SessionRepo;
use devspace_db::DbPool;
use tokio_util::sync::CancellationToken;

/// How often the cleanup job runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// Run the session cleanup loop until `cancel` is triggered.
///
/// Sessions that expired or were revoked before the tick are removed from
/// the database; the auth extractor already rejects them.
pub async fn run(pool: DbPool, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = CLEANUP_INTERVAL.as_secs(),
        "Session cleanup job started"
    );

    let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session cleanup job stopping");
                break;
            }
            _ = interval.tick() => {
                match SessionRepo::purge_inactive(&pool, Utc::now()).await {
                    Ok(0) => tracing::debug!("Session cleanup: nothing to purge"),
                    Ok(purged) => tracing::info!(purged, "Session cleanup: purged sessions"),
                    Err(e) => tracing::error!(error = %e, "Session cleanup failed"),
                }
            }
        }
    }
}
