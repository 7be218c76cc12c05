use std::time::Duration;

use devspace_relay::manager::RelayConfig;
use devspace_relay::reconnect::ReconnectConfig;

use crate::auth::jwt::JwtConfig;

/// Default HTTP request timeout. Kept above the execution deadline so a
/// blocking `?wait=true` execute call resolves before the server gives up.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 45;

/// Default per-execution deadline, measured from submission.
pub const DEFAULT_EXECUTION_TIMEOUT_SECS: u64 = 30;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `45`).
    pub request_timeout_secs: u64,
    /// Token signing and session lifetime.
    pub jwt: JwtConfig,
    /// Execution worker link and dispatch tuning.
    pub relay: RelayConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `8080`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `45`                       |
    ///
    /// See [`JwtConfig::from_env`] and [`relay_config_from_env`] for the rest.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .map(|v| v.parse().expect("REQUEST_TIMEOUT_SECS must be a valid u64"))
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            jwt: JwtConfig::from_env(),
            relay: relay_config_from_env(),
        }
    }
}

/// Load the execution relay settings.
///
/// | Env Var                     | Default                   |
/// |-----------------------------|---------------------------|
/// | `WORKER_WS_URL`             | `ws://127.0.0.1:8000/ws`  |
/// | `EXECUTION_TIMEOUT_SECS`    | `30`                      |
/// | `WORKER_SEND_TIMEOUT_MS`    | `5000`                    |
/// | `WORKER_CONNECT_WAIT_MS`    | `2000`                    |
/// | `WORKER_RECONNECT_MAX_SECS` | `30`                      |
/// | `EXECUTION_RETENTION_SECS`  | `3600`                    |
pub fn relay_config_from_env() -> RelayConfig {
    let defaults = RelayConfig::default();

    let worker_url = std::env::var("WORKER_WS_URL").unwrap_or(defaults.worker_url);

    let request_timeout_secs: u64 = std::env::var("EXECUTION_TIMEOUT_SECS")
        .map(|v| v.parse().expect("EXECUTION_TIMEOUT_SECS must be a valid u64"))
        .unwrap_or(DEFAULT_EXECUTION_TIMEOUT_SECS);

    let send_timeout_ms: u64 = std::env::var("WORKER_SEND_TIMEOUT_MS")
        .unwrap_or_else(|_| "5000".into())
        .parse()
        .expect("WORKER_SEND_TIMEOUT_MS must be a valid u64");

    let connect_wait_ms: u64 = std::env::var("WORKER_CONNECT_WAIT_MS")
        .unwrap_or_else(|_| "2000".into())
        .parse()
        .expect("WORKER_CONNECT_WAIT_MS must be a valid u64");

    let reconnect_max_secs: u64 = std::env::var("WORKER_RECONNECT_MAX_SECS")
        .unwrap_or_else(|_| "30".into())
        .parse()
        .expect("WORKER_RECONNECT_MAX_SECS must be a valid u64");

    let retention_secs: u64 = std::env::var("EXECUTION_RETENTION_SECS")
        .unwrap_or_else(|_| "3600".into())
        .parse()
        .expect("EXECUTION_RETENTION_SECS must be a valid u64");

    RelayConfig {
        worker_url,
        request_timeout: Duration::from_secs(request_timeout_secs),
        send_timeout: Duration::from_millis(send_timeout_ms),
        connect_wait: Duration::from_millis(connect_wait_ms),
        reconnect: ReconnectConfig {
            max_delay: Duration::from_secs(reconnect_max_secs),
            ..ReconnectConfig::default()
        },
        result_retention: Duration::from_secs(retention_secs),
        ..defaults
    }
}
