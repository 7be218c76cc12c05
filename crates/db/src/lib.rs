//! SQLite-backed store for users, code repositories, files and sessions.
//!
//! The repositories in [`repositories`] take `&DbPool` as their first
//! argument. Schema lives in `migrations/` and is applied by
//! [`run_migrations`] at startup.

use std::str::FromStr;
use std::time::Duration;

use devspace_core::types::DocId;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub mod models;
pub mod repositories;

pub type DbPool = sqlx::SqlitePool;

/// Create a connection pool from a database URL.
///
/// The database file is created if missing and foreign keys are enforced.
/// An in-memory URL (`sqlite::memory:`) is pinned to a single connection
/// that never idles out, since each SQLite connection would otherwise get
/// its own empty database.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(8)
    };

    pool_options.connect_with(options).await
}

/// Run a trivial query to confirm the database answers.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending schema migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// A fresh, migrated in-memory database. Used by tests and throwaway runs.
pub async fn create_memory_pool() -> Result<DbPool, sqlx::Error> {
    let pool = create_pool("sqlite::memory:").await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

/// Errors raised by repository operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A row with the same unique key already exists.
    #[error("Duplicate value violates unique constraint: {constraint}")]
    UniqueViolation { constraint: &'static str },

    /// A referenced row does not exist.
    #[error("Referenced {entity} {id} does not exist")]
    MissingReference { entity: &'static str, id: DocId },

    /// The pool could not hand out a connection in time.
    #[error("Database unavailable")]
    Unavailable,

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => DbError::Unavailable,
            other => DbError::Sqlx(other),
        }
    }
}

impl DbError {
    /// Map a unique-constraint failure to [`DbError::UniqueViolation`].
    ///
    /// SQLite does not report constraint names, so the caller names it.
    pub(crate) fn unique(err: sqlx::Error, constraint: &'static str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DbError::UniqueViolation { constraint }
            }
            _ => err.into(),
        }
    }

    /// Map a foreign-key failure to [`DbError::MissingReference`].
    pub(crate) fn reference(err: sqlx::Error, entity: &'static str, id: DocId) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                DbError::MissingReference { entity, id }
            }
            _ => err.into(),
        }
    }
}
