//! Repository for the `files` table.

use chrono::Utc;
use devspace_core::types::DocId;
use uuid::Uuid;

use super::CodeRepositoryRepo;
use crate::models::file::{CreateFile, FileData};
use crate::{DbError, DbPool};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, filename, language, repository_id, content, last_modified";

/// Provides CRUD operations for source files.
pub struct FileRepo;

impl FileRepo {
    /// Insert a new file, attaching it to its repository when one is given.
    pub async fn create(pool: &DbPool, input: &CreateFile) -> Result<FileData, DbError> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO files (id, filename, language, repository_id, content, last_modified)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {COLUMNS}"
        );
        let file = sqlx::query_as::<_, FileData>(&query)
            .bind(Uuid::new_v4())
            .bind(&input.filename)
            .bind(&input.language)
            .bind(input.repository_id)
            .bind(&input.content)
            .bind(Utc::now())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| match input.repository_id {
                Some(id) => DbError::reference(e, "repository", id),
                None => e.into(),
            })?;

        if let Some(repository_id) = file.repository_id {
            CodeRepositoryRepo::attach_file_in(&mut *tx, repository_id, file.id).await?;
        }

        tx.commit().await?;
        Ok(file)
    }

    /// Find a file by ID.
    pub async fn find_by_id(pool: &DbPool, id: DocId) -> Result<Option<FileData>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM files WHERE id = ?");
        Ok(sqlx::query_as::<_, FileData>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?)
    }

    /// List the files of a repository ordered by filename.
    pub async fn list_by_repository(
        pool: &DbPool,
        repository_id: DocId,
    ) -> Result<Vec<FileData>, DbError> {
        let query =
            format!("SELECT {COLUMNS} FROM files WHERE repository_id = ? ORDER BY filename");
        Ok(sqlx::query_as::<_, FileData>(&query)
            .bind(repository_id)
            .fetch_all(pool)
            .await?)
    }

    /// Replace a file's content and bump `last_modified`.
    ///
    /// Returns `None` if no file with the given `id` exists.
    pub async fn update_content(
        pool: &DbPool,
        id: DocId,
        content: &str,
    ) -> Result<Option<FileData>, DbError> {
        let query = format!(
            "UPDATE files SET content = ?, last_modified = ?
             WHERE id = ?
             RETURNING {COLUMNS}"
        );
        Ok(sqlx::query_as::<_, FileData>(&query)
            .bind(content)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(pool)
            .await?)
    }

    /// Delete a file and detach it from its repository.
    ///
    /// Returns `true` if the file existed.
    pub async fn delete(pool: &DbPool, id: DocId) -> Result<bool, DbError> {
        let mut tx = pool.begin().await?;
        let removed: Option<(Option<DocId>,)> =
            sqlx::query_as("DELETE FROM files WHERE id = ? RETURNING repository_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some((repository_id,)) = removed else {
            return Ok(false);
        };
        if let Some(repository_id) = repository_id {
            CodeRepositoryRepo::detach_file_in(&mut *tx, repository_id, id).await?;
        }
        tx.commit().await?;
        Ok(true)
    }
}
