//! Handlers for the `/repositories` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use devspace_core::error::CoreError;
use devspace_core::types::DocId;
use devspace_db::models::code_repository::{
    CodeRepository, CreateCodeRepository, UpdateCodeRepository,
};
use devspace_db::models::file::FileData;
use devspace_db::models::user::UserResponse;
use devspace_db::repositories::{CodeRepositoryRepo, FileRepo, UserRepo};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) async fn find_repository(state: &AppState, id: DocId) -> AppResult<CodeRepository> {
    CodeRepositoryRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Repository",
            id,
        }))
}

fn ensure_owner(repo: &CodeRepository, auth: &AuthUser) -> AppResult<()> {
    if repo.owner_id != auth.user_id {
        return Err(AppError::Core(CoreError::Forbidden(
            "Only the repository owner can do this".into(),
        )));
    }
    Ok(())
}

fn validate_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "repositoryName: must not be empty".into(),
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/repositories/accessible
///
/// Repositories the caller owns or collaborates on.
pub async fn list_accessible(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DataResponse<Vec<CodeRepository>>>> {
    let repos = CodeRepositoryRepo::list_accessible(&state.pool, auth.user_id).await?;
    Ok(Json(DataResponse::new(repos)))
}

/// GET /api/v1/repositories/user/{user_id}
pub async fn list_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<DocId>,
) -> AppResult<Json<DataResponse<Vec<CodeRepository>>>> {
    let repos = CodeRepositoryRepo::list_by_owner(&state.pool, user_id).await?;
    Ok(Json(DataResponse::new(repos)))
}

/// GET /api/v1/repositories/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DocId>,
) -> AppResult<Json<DataResponse<CodeRepository>>> {
    let repo = find_repository(&state, id).await?;
    Ok(Json(DataResponse::new(repo)))
}

/// GET /api/v1/repositories/{id}/collaborators
///
/// Collaborator ids that no longer resolve to a user are skipped.
pub async fn list_collaborators(
    State(state): State<AppState>,
    Path(id): Path<DocId>,
) -> AppResult<Json<DataResponse<Vec<UserResponse>>>> {
    let repo = find_repository(&state, id).await?;

    let mut users = Vec::with_capacity(repo.collaborator_ids.len());
    for user_id in repo.collaborator_ids {
        if let Some(user) = UserRepo::find_by_id(&state.pool, user_id).await? {
            users.push(user.into());
        }
    }
    Ok(Json(DataResponse::new(users)))
}

/// GET /api/v1/repositories/{id}/files
pub async fn list_files(
    State(state): State<AppState>,
    Path(id): Path<DocId>,
) -> AppResult<Json<DataResponse<Vec<FileData>>>> {
    find_repository(&state, id).await?;
    let files = FileRepo::list_by_repository(&state.pool, id).await?;
    Ok(Json(DataResponse::new(files)))
}

/// POST /api/v1/repositories
///
/// The caller becomes the owner.
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CreateCodeRepository>,
) -> AppResult<(StatusCode, Json<DataResponse<CodeRepository>>)> {
    validate_name(&input.repository_name)?;

    let repo = CodeRepositoryRepo::create(&state.pool, auth.user_id, &input).await?;
    tracing::info!(repository_id = %repo.id, owner_id = %auth.user_id, "Repository created");
    Ok((StatusCode::CREATED, Json(DataResponse::new(repo))))
}

/// PUT /api/v1/repositories/{id}
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DocId>,
    Json(input): Json<UpdateCodeRepository>,
) -> AppResult<Json<DataResponse<CodeRepository>>> {
    let repo = find_repository(&state, id).await?;
    ensure_owner(&repo, &auth)?;
    if let Some(name) = &input.repository_name {
        validate_name(name)?;
    }

    let repo = CodeRepositoryRepo::update(&state.pool, id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Repository",
            id,
        }))?;
    Ok(Json(DataResponse::new(repo)))
}

/// DELETE /api/v1/repositories/{id}
///
/// Deletes the repository's files with it.
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DocId>,
) -> AppResult<StatusCode> {
    let repo = find_repository(&state, id).await?;
    ensure_owner(&repo, &auth)?;

    CodeRepositoryRepo::delete(&state.pool, id).await?;
    tracing::info!(repository_id = %id, "Repository deleted");
    Ok(StatusCode::NO_CONTENT)
}
