//! Handlers for the `/auth` resource (signup, signin, signout, check-session).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use devspace_core::error::CoreError;
use devspace_core::types::Timestamp;
use devspace_core::validation::validate_input;
use devspace_db::models::session::CreateSession;
use devspace_db::models::user::{CreateUser, UserResponse};
use devspace_db::repositories::{SessionRepo, UserRepo};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::jwt::generate_access_token;
use crate::auth::password::{hash_password, verify_password};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/signup`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(min = 3, max = 32, message = "must be between 3 and 32 characters"))]
    pub username: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    pub avatar_url: Option<String>,
}

/// Request body for `POST /auth/signin`.
#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub username: String,
    pub password: String,
}

/// Successful sign-in response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub expires_at: Timestamp,
    pub user: UserResponse,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    Json(input): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<UserResponse>>)> {
    validate_input(&input)?;

    let password_hash = hash_password(&input.password)?;
    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            username: input.username,
            email: input.email,
            password_hash,
            avatar_url: input.avatar_url,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, username = %user.username, "User signed up");
    Ok((StatusCode::CREATED, Json(DataResponse::new(user.into()))))
}

/// POST /api/v1/auth/signin
///
/// Verify credentials, open a session and return a token bound to it.
pub async fn signin(
    State(state): State<AppState>,
    Json(input): Json<SigninRequest>,
) -> AppResult<Json<DataResponse<AuthResponse>>> {
    let invalid = || {
        AppError::Core(CoreError::Unauthorized(
            "Invalid username or password".into(),
        ))
    };

    let user = UserRepo::find_by_username(&state.pool, &input.username)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&input.password, &user.password_hash) {
        tracing::info!(username = %input.username, "Sign-in rejected");
        return Err(invalid());
    }

    let session = SessionRepo::create(
        &state.pool,
        &CreateSession {
            user_id: user.id,
            expires_at: state.config.jwt.session_expires_at(),
        },
    )
    .await?;

    let access_token =
        generate_access_token(user.id, session.id, session.expires_at, &state.config.jwt)
            .map_err(|e| AppError::InternalError(format!("Token generation failed: {e}")))?;

    tracing::info!(user_id = %user.id, session_id = %session.id, "User signed in");
    Ok(Json(DataResponse::new(AuthResponse {
        access_token,
        expires_at: session.expires_at,
        user: user.into(),
    })))
}

/// POST /api/v1/auth/signout
pub async fn signout(State(state): State<AppState>, auth: AuthUser) -> AppResult<StatusCode> {
    SessionRepo::revoke(&state.pool, auth.session_id).await?;
    tracing::info!(user_id = %auth.user_id, session_id = %auth.session_id, "User signed out");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/auth/check-session
///
/// Returns the signed-in user.
pub async fn check_session(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let user = UserRepo::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "User",
            id: auth.user_id,
        }))?;
    Ok(Json(DataResponse::new(user.into())))
}
