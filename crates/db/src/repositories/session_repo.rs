//! Repository for the `sessions` table.

use chrono::Utc;
use devspace_core::types::{DocId, Timestamp};
use uuid::Uuid;

use crate::models::session::{CreateSession, Session};
use crate::{DbError, DbPool};

const COLUMNS: &str = "id, user_id, created_at, expires_at, revoked_at";

/// Provides CRUD operations for login sessions.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a new session, returning the created row.
    pub async fn create(pool: &DbPool, input: &CreateSession) -> Result<Session, DbError> {
        let query = format!(
            "INSERT INTO sessions (id, user_id, created_at, expires_at)
             VALUES (?, ?, ?, ?)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(Uuid::new_v4())
            .bind(input.user_id)
            .bind(Utc::now())
            .bind(input.expires_at)
            .fetch_one(pool)
            .await
            .map_err(|e| DbError::reference(e, "user", input.user_id))
    }

    /// Find a session that is neither revoked nor expired.
    pub async fn find_active(pool: &DbPool, id: DocId) -> Result<Option<Session>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM sessions WHERE id = ? AND revoked_at IS NULL");
        let session = sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        let now = Utc::now();
        Ok(session.filter(|s| s.is_active(now)))
    }

    /// Revoke a single session. Returns `true` if it was active.
    pub async fn revoke(pool: &DbPool, id: DocId) -> Result<bool, DbError> {
        let result =
            sqlx::query("UPDATE sessions SET revoked_at = ? WHERE id = ? AND revoked_at IS NULL")
                .bind(Utc::now())
                .bind(id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoke every active session belonging to a user.
    ///
    /// Returns the number of sessions revoked.
    pub async fn revoke_all_for_user(pool: &DbPool, user_id: DocId) -> Result<u64, DbError> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked_at = ? WHERE user_id = ? AND revoked_at IS NULL",
        )
        .bind(Utc::now())
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Drop sessions that expired or were revoked before `cutoff`.
    ///
    /// Timestamps are stored as UTC RFC 3339 text, which sorts chronologically.
    pub async fn purge_inactive(pool: &DbPool, cutoff: Timestamp) -> Result<u64, DbError> {
        let result = sqlx::query(
            "DELETE FROM sessions
             WHERE expires_at <= ? OR (revoked_at IS NOT NULL AND revoked_at <= ?)",
        )
        .bind(cutoff)
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_memory_pool;
    use crate::models::user::CreateUser;
    use crate::repositories::UserRepo;

    async fn seed_user(pool: &DbPool) -> DocId {
        UserRepo::create(
            pool,
            &CreateUser {
                username: "ada".into(),
                email: "ada@example.com".into(),
                password_hash: "hash".into(),
                avatar_url: None,
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn revoked_session_is_not_active() {
        let pool = create_memory_pool().await.unwrap();
        let user_id = seed_user(&pool).await;
        let session = SessionRepo::create(
            &pool,
            &CreateSession {
                user_id,
                expires_at: Utc::now() + chrono::Duration::hours(1),
            },
        )
        .await
        .unwrap();

        assert!(SessionRepo::find_active(&pool, session.id).await.unwrap().is_some());
        assert!(SessionRepo::revoke(&pool, session.id).await.unwrap());
        assert!(!SessionRepo::revoke(&pool, session.id).await.unwrap());
        assert!(SessionRepo::find_active(&pool, session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_session_is_not_active() {
        let pool = create_memory_pool().await.unwrap();
        let user_id = seed_user(&pool).await;
        let session = SessionRepo::create(
            &pool,
            &CreateSession {
                user_id,
                expires_at: Utc::now() - chrono::Duration::seconds(1),
            },
        )
        .await
        .unwrap();

        assert!(SessionRepo::find_active(&pool, session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn session_for_unknown_user_is_rejected() {
        let pool = create_memory_pool().await.unwrap();
        let err = SessionRepo::create(
            &pool,
            &CreateSession {
                user_id: Uuid::new_v4(),
                expires_at: Utc::now(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DbError::MissingReference { entity: "user", .. }));
    }

    #[tokio::test]
    async fn deleting_user_drops_sessions() {
        let pool = create_memory_pool().await.unwrap();
        let user_id = seed_user(&pool).await;
        let expires_at = Utc::now() + chrono::Duration::hours(1);
        let a = SessionRepo::create(&pool, &CreateSession { user_id, expires_at })
            .await
            .unwrap();

        UserRepo::delete(&pool, user_id).await.unwrap();

        assert!(SessionRepo::find_active(&pool, a.id).await.unwrap().is_none());
        assert_eq!(SessionRepo::revoke_all_for_user(&pool, user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn purge_drops_expired_sessions() {
        let pool = create_memory_pool().await.unwrap();
        let user_id = seed_user(&pool).await;
        SessionRepo::create(
            &pool,
            &CreateSession {
                user_id,
                expires_at: Utc::now() - chrono::Duration::hours(2),
            },
        )
        .await
        .unwrap();
        let live = SessionRepo::create(
            &pool,
            &CreateSession {
                user_id,
                expires_at: Utc::now() + chrono::Duration::hours(2),
            },
        )
        .await
        .unwrap();

        let purged = SessionRepo::purge_inactive(&pool, Utc::now() - chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert!(SessionRepo::find_active(&pool, live.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn purge_drops_long_revoked_sessions_only() {
        let pool = create_memory_pool().await.unwrap();
        let user_id = seed_user(&pool).await;
        let expires_at = Utc::now() + chrono::Duration::hours(2);
        let revoked = SessionRepo::create(&pool, &CreateSession { user_id, expires_at })
            .await
            .unwrap();
        SessionRepo::revoke(&pool, revoked.id).await.unwrap();

        // Revoked after the cutoff: kept for now.
        let early = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(SessionRepo::purge_inactive(&pool, early).await.unwrap(), 0);

        let later = Utc::now() + chrono::Duration::seconds(1);
        assert_eq!(SessionRepo::purge_inactive(&pool, later).await.unwrap(), 1);
    }
}
