//! Code repository document model and DTOs.

use devspace_core::types::{DocId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A named collection of files owned by one user and shared with
/// collaborators.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CodeRepository {
    pub id: DocId,
    pub repository_name: String,
    pub description: String,
    pub owner_id: DocId,
    #[sqlx(json)]
    pub file_ids: Vec<DocId>,
    #[sqlx(json)]
    pub collaborator_ids: Vec<DocId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CodeRepository {
    /// Whether `user_id` owns the repository or is listed as a collaborator.
    pub fn is_accessible_by(&self, user_id: DocId) -> bool {
        self.owner_id == user_id || self.collaborator_ids.contains(&user_id)
    }
}

/// DTO for creating a repository. The owner comes from the session.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCodeRepository {
    pub repository_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub collaborator_ids: Vec<DocId>,
}

/// DTO for updating a repository. All fields are optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCodeRepository {
    pub repository_name: Option<String>,
    pub description: Option<String>,
    pub file_ids: Option<Vec<DocId>>,
    pub collaborator_ids: Option<Vec<DocId>>,
}
