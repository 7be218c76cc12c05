//! Repository for the `users` table.

use chrono::Utc;
use devspace_core::types::DocId;
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::user::{CreateUser, UpdateUser, User};
use crate::{DbError, DbPool};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, username, email, avatar_url, password_hash, stats, projects, \
                       activities, skills, location, title, created_at, updated_at";

/// Unique key on `username`.
const UQ_USERNAME: &str = "uq_users_username";

/// Provides CRUD operations for users.
pub struct UserRepo;

impl UserRepo {
    /// Insert a new user, returning the created row.
    pub async fn create(pool: &DbPool, input: &CreateUser) -> Result<User, DbError> {
        let now = Utc::now();
        let query = format!(
            "INSERT INTO users (id, username, email, avatar_url, password_hash, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(Uuid::new_v4())
            .bind(&input.username)
            .bind(&input.email)
            .bind(&input.avatar_url)
            .bind(&input.password_hash)
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
            .map_err(|e| DbError::unique(e, UQ_USERNAME))
    }

    /// Find a user by ID.
    pub async fn find_by_id(pool: &DbPool, id: DocId) -> Result<Option<User>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = ?");
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?)
    }

    /// Find a user by username (case-sensitive).
    pub async fn find_by_username(pool: &DbPool, username: &str) -> Result<Option<User>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE username = ?");
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(pool)
            .await?)
    }

    /// Update a user. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no user with the given `id` exists.
    pub async fn update(
        pool: &DbPool,
        id: DocId,
        input: &UpdateUser,
    ) -> Result<Option<User>, DbError> {
        let query = format!(
            "UPDATE users SET
                username = COALESCE(?, username),
                email = COALESCE(?, email),
                avatar_url = COALESCE(?, avatar_url),
                stats = COALESCE(?, stats),
                projects = COALESCE(?, projects),
                activities = COALESCE(?, activities),
                skills = COALESCE(?, skills),
                location = COALESCE(?, location),
                title = COALESCE(?, title),
                updated_at = ?
             WHERE id = ?
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.username)
            .bind(&input.email)
            .bind(&input.avatar_url)
            .bind(input.stats.as_ref().map(Json))
            .bind(input.projects.as_ref().map(Json))
            .bind(input.activities.as_ref().map(Json))
            .bind(input.skills.as_ref().map(Json))
            .bind(&input.location)
            .bind(&input.title)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| DbError::unique(e, UQ_USERNAME))
    }

    /// Delete a user. Their sessions go with them (`ON DELETE CASCADE`).
    ///
    /// Returns `true` if the user existed.
    pub async fn delete(pool: &DbPool, id: DocId) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        let removed = result.rows_affected() > 0;
        if removed {
            tracing::debug!(user_id = %id, "User deleted, sessions dropped");
        }
        Ok(removed)
    }
}
