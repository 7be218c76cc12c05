use std::sync::Arc;

use devspace_relay::manager::RelayManager;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: every field is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection pool.
    pub pool: devspace_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Execution relay (worker link, dispatch queue, result table).
    pub relay: Arc<RelayManager>,
}
