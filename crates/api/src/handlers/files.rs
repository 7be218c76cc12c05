//! Handlers for the `/files` resource, including remote execution.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use devspace_core::error::CoreError;
use devspace_core::types::DocId;
use devspace_db::models::file::{CreateFile, FileData};
use devspace_db::repositories::FileRepo;
use devspace_relay::execution::{ExecutionRequest, ExecutionResult, RequestId};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::handlers::repositories::find_repository;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for `PUT /files/{id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateFileRequest {
    pub content: String,
}

/// Query parameters for `POST /files/{id}/execute`.
#[derive(Debug, Default, Deserialize)]
pub struct ExecuteParams {
    /// Block until the result is terminal (bounded by the execution deadline).
    #[serde(default)]
    pub wait: bool,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_file(state: &AppState, id: DocId) -> AppResult<FileData> {
    FileRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "File", id }))
}

/// Files inside a repository are writable by its owner and collaborators.
/// Loose files are writable by any signed-in user.
async fn ensure_file_access(
    state: &AppState,
    repository_id: Option<DocId>,
    auth: &AuthUser,
) -> AppResult<()> {
    let Some(repository_id) = repository_id else {
        return Ok(());
    };
    let repo = find_repository(state, repository_id).await?;
    if !repo.is_accessible_by(auth.user_id) {
        return Err(AppError::Core(CoreError::Forbidden(
            "You do not have access to this repository".into(),
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/files
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CreateFile>,
) -> AppResult<(StatusCode, Json<DataResponse<FileData>>)> {
    if input.filename.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "filename: must not be empty".into(),
        )));
    }
    ensure_file_access(&state, input.repository_id, &auth).await?;

    let file = FileRepo::create(&state.pool, &input).await?;
    tracing::info!(file_id = %file.id, repository_id = ?file.repository_id, "File created");
    Ok((StatusCode::CREATED, Json(DataResponse::new(file))))
}

/// GET /api/v1/files/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DocId>,
) -> AppResult<Json<DataResponse<FileData>>> {
    let file = find_file(&state, id).await?;
    Ok(Json(DataResponse::new(file)))
}

/// PUT /api/v1/files/{id}
///
/// Replaces the content and bumps `lastModified`.
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DocId>,
    Json(input): Json<UpdateFileRequest>,
) -> AppResult<Json<DataResponse<FileData>>> {
    let file = find_file(&state, id).await?;
    ensure_file_access(&state, file.repository_id, &auth).await?;

    let file = FileRepo::update_content(&state.pool, id, &input.content)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "File", id }))?;
    Ok(Json(DataResponse::new(file)))
}

/// DELETE /api/v1/files/{id}
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DocId>,
) -> AppResult<StatusCode> {
    let file = find_file(&state, id).await?;
    ensure_file_access(&state, file.repository_id, &auth).await?;

    FileRepo::delete(&state.pool, id).await?;
    tracing::info!(file_id = %id, "File deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/files/{id}/execute
///
/// Queues the file's current content on the execution worker and returns
/// `202 Accepted` with the pending result. With `?wait=true` the handler
/// holds the request until the result is terminal and returns `200 OK`.
pub async fn execute(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DocId>,
    Query(params): Query<ExecuteParams>,
) -> AppResult<(StatusCode, Json<DataResponse<ExecutionResult>>)> {
    let file = find_file(&state, id).await?;
    ensure_file_access(&state, file.repository_id, &auth).await?;

    let request = ExecutionRequest::new(file.id, file.filename, file.language, file.content);
    let handle = state.relay.submit(request).await?;
    tracing::info!(
        request_id = %handle.request_id(),
        file_id = %id,
        user_id = %auth.user_id,
        "Execution submitted",
    );

    if params.wait {
        let result = handle.wait().await;
        return Ok((StatusCode::OK, Json(DataResponse::new(result))));
    }
    Ok((StatusCode::ACCEPTED, Json(DataResponse::new(handle.current()))))
}

/// GET /api/v1/files/executions/{request_id}
pub async fn get_execution(
    State(state): State<AppState>,
    Path(request_id): Path<RequestId>,
) -> AppResult<Json<DataResponse<ExecutionResult>>> {
    let result = state
        .relay
        .get_result(request_id)
        .await
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Execution",
            id: request_id,
        }))?;
    Ok(Json(DataResponse::new(result)))
}
