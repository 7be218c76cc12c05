//! Repository for the `repositories` table.

use chrono::Utc;
use devspace_core::types::DocId;
use sqlx::types::Json;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::models::code_repository::{CodeRepository, CreateCodeRepository, UpdateCodeRepository};
use crate::{DbError, DbPool};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, repository_name, description, owner_id, file_ids, collaborator_ids, \
                       created_at, updated_at";

/// Provides CRUD operations for code repositories.
pub struct CodeRepositoryRepo;

impl CodeRepositoryRepo {
    /// Insert a new repository owned by `owner_id`.
    pub async fn create(
        pool: &DbPool,
        owner_id: DocId,
        input: &CreateCodeRepository,
    ) -> Result<CodeRepository, DbError> {
        let now = Utc::now();
        let query = format!(
            "INSERT INTO repositories
                (id, repository_name, description, owner_id, collaborator_ids, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING {COLUMNS}"
        );
        Ok(sqlx::query_as::<_, CodeRepository>(&query)
            .bind(Uuid::new_v4())
            .bind(&input.repository_name)
            .bind(&input.description)
            .bind(owner_id)
            .bind(Json(&input.collaborator_ids))
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await?)
    }

    /// Find a repository by ID.
    pub async fn find_by_id(pool: &DbPool, id: DocId) -> Result<Option<CodeRepository>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM repositories WHERE id = ?");
        Ok(sqlx::query_as::<_, CodeRepository>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?)
    }

    /// List repositories owned by a user, most recently created first.
    pub async fn list_by_owner(
        pool: &DbPool,
        owner_id: DocId,
    ) -> Result<Vec<CodeRepository>, DbError> {
        let query = format!(
            "SELECT {COLUMNS} FROM repositories WHERE owner_id = ? ORDER BY created_at DESC"
        );
        Ok(sqlx::query_as::<_, CodeRepository>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await?)
    }

    /// List repositories the user owns or collaborates on, most recently
    /// created first.
    pub async fn list_accessible(
        pool: &DbPool,
        user_id: DocId,
    ) -> Result<Vec<CodeRepository>, DbError> {
        // Collaborator ids are stored as hyphenated UUID strings.
        let query = format!(
            "SELECT {COLUMNS} FROM repositories
             WHERE owner_id = ?
                OR EXISTS (SELECT 1 FROM json_each(repositories.collaborator_ids) WHERE value = ?)
             ORDER BY created_at DESC"
        );
        Ok(sqlx::query_as::<_, CodeRepository>(&query)
            .bind(user_id)
            .bind(user_id.to_string())
            .fetch_all(pool)
            .await?)
    }

    /// Update a repository. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no repository with the given `id` exists.
    pub async fn update(
        pool: &DbPool,
        id: DocId,
        input: &UpdateCodeRepository,
    ) -> Result<Option<CodeRepository>, DbError> {
        let query = format!(
            "UPDATE repositories SET
                repository_name = COALESCE(?, repository_name),
                description = COALESCE(?, description),
                file_ids = COALESCE(?, file_ids),
                collaborator_ids = COALESCE(?, collaborator_ids),
                updated_at = ?
             WHERE id = ?
             RETURNING {COLUMNS}"
        );
        Ok(sqlx::query_as::<_, CodeRepository>(&query)
            .bind(&input.repository_name)
            .bind(&input.description)
            .bind(input.file_ids.as_ref().map(Json))
            .bind(input.collaborator_ids.as_ref().map(Json))
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(pool)
            .await?)
    }

    /// Append a file id to the repository's file list (no duplicates).
    ///
    /// Returns `false` if the repository does not exist.
    pub async fn attach_file(pool: &DbPool, id: DocId, file_id: DocId) -> Result<bool, DbError> {
        let mut tx = pool.begin().await?;
        let found = Self::attach_file_in(&mut *tx, id, file_id).await?;
        tx.commit().await?;
        Ok(found)
    }

    /// Remove a file id from the repository's file list.
    ///
    /// Returns `false` if the repository does not exist.
    pub async fn detach_file(pool: &DbPool, id: DocId, file_id: DocId) -> Result<bool, DbError> {
        let mut tx = pool.begin().await?;
        let found = Self::detach_file_in(&mut *tx, id, file_id).await?;
        tx.commit().await?;
        Ok(found)
    }

    /// Delete a repository. Its files go with it (`ON DELETE CASCADE`).
    ///
    /// Returns `true` if the repository existed.
    pub async fn delete(pool: &DbPool, id: DocId) -> Result<bool, DbError> {
        let mut tx = pool.begin().await?;
        let (deleted_files,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM files WHERE repository_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        let result = sqlx::query("DELETE FROM repositories WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let removed = result.rows_affected() > 0;
        if removed {
            tracing::debug!(repository_id = %id, deleted_files, "Repository deleted");
        }
        Ok(removed)
    }

    pub(crate) async fn attach_file_in(
        conn: &mut SqliteConnection,
        id: DocId,
        file_id: DocId,
    ) -> Result<bool, DbError> {
        let Some(mut file_ids) = Self::file_ids_in(conn, id).await? else {
            return Ok(false);
        };
        if !file_ids.contains(&file_id) {
            file_ids.push(file_id);
            Self::store_file_ids_in(conn, id, &file_ids).await?;
        }
        Ok(true)
    }

    pub(crate) async fn detach_file_in(
        conn: &mut SqliteConnection,
        id: DocId,
        file_id: DocId,
    ) -> Result<bool, DbError> {
        let Some(mut file_ids) = Self::file_ids_in(conn, id).await? else {
            return Ok(false);
        };
        let before = file_ids.len();
        file_ids.retain(|f| *f != file_id);
        if file_ids.len() != before {
            Self::store_file_ids_in(conn, id, &file_ids).await?;
        }
        Ok(true)
    }

    async fn file_ids_in(
        conn: &mut SqliteConnection,
        id: DocId,
    ) -> Result<Option<Vec<DocId>>, DbError> {
        let row: Option<(Json<Vec<DocId>>,)> =
            sqlx::query_as("SELECT file_ids FROM repositories WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
        Ok(row.map(|(ids,)| ids.0))
    }

    async fn store_file_ids_in(
        conn: &mut SqliteConnection,
        id: DocId,
        file_ids: &[DocId],
    ) -> Result<(), DbError> {
        sqlx::query("UPDATE repositories SET file_ids = ?, updated_at = ? WHERE id = ?")
            .bind(Json(file_ids))
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}
