//! Source file document model and DTOs.

use devspace_core::types::{DocId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub id: DocId,
    pub filename: String,
    /// Toolchain key understood by the execution worker (`python`, `c`, ...).
    pub language: String,
    pub repository_id: Option<DocId>,
    pub content: String,
    pub last_modified: Timestamp,
}

/// DTO for creating a file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFile {
    pub filename: String,
    pub language: String,
    pub repository_id: Option<DocId>,
    #[serde(default)]
    pub content: String,
}
