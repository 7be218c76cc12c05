//! Handlers for the `/users` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use devspace_core::error::CoreError;
use devspace_core::types::DocId;
use devspace_db::models::user::{Activity, Project, Stat, UpdateUser, User, UserResponse};
use devspace_db::repositories::UserRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

async fn find_user(state: &AppState, id: DocId) -> AppResult<User> {
    UserRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "User", id }))
}

/// GET /api/v1/users/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DocId>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let user = find_user(&state, id).await?;
    Ok(Json(DataResponse::new(user.into())))
}

/// GET /api/v1/users/{id}/stats
pub async fn get_stats(
    State(state): State<AppState>,
    Path(id): Path<DocId>,
) -> AppResult<Json<DataResponse<Vec<Stat>>>> {
    let user = find_user(&state, id).await?;
    Ok(Json(DataResponse::new(user.stats)))
}

/// GET /api/v1/users/{id}/projects
pub async fn get_projects(
    State(state): State<AppState>,
    Path(id): Path<DocId>,
) -> AppResult<Json<DataResponse<Vec<Project>>>> {
    let user = find_user(&state, id).await?;
    Ok(Json(DataResponse::new(user.projects)))
}

/// GET /api/v1/users/{id}/activities
pub async fn get_activities(
    State(state): State<AppState>,
    Path(id): Path<DocId>,
) -> AppResult<Json<DataResponse<Vec<Activity>>>> {
    let user = find_user(&state, id).await?;
    Ok(Json(DataResponse::new(user.activities)))
}

/// GET /api/v1/users/{id}/profile
///
/// Everything the profile page shows, in one response.
pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<DocId>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    get_by_id(State(state), Path(id)).await
}

/// PUT /api/v1/users/{id}
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DocId>,
    Json(input): Json<UpdateUser>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    auth.ensure_self(id)?;

    if input.username.as_deref().is_some_and(|u| u.trim().len() < 3) {
        return Err(AppError::Core(CoreError::Validation(
            "username: must be between 3 and 32 characters".into(),
        )));
    }

    let user = UserRepo::update(&state.pool, id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "User", id }))?;
    Ok(Json(DataResponse::new(user.into())))
}

/// DELETE /api/v1/users/{id}
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DocId>,
) -> AppResult<StatusCode> {
    auth.ensure_self(id)?;

    if UserRepo::delete(&state.pool, id).await? {
        tracing::info!(user_id = %id, "User deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::NotFound { entity: "User", id }))
    }
}
