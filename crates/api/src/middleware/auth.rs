//! Session-backed authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use devspace_core::error::CoreError;
use devspace_core::types::DocId;
use devspace_db::repositories::SessionRepo;

use crate::auth::jwt::validate_token;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Authenticated user extracted from the `Authorization: Bearer` header.
///
/// The token must be valid and its session (`jti`) must still be active.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = %user.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: DocId,
    pub session_id: DocId,
}

impl AuthUser {
    /// Fail with 403 unless the caller is `user_id`.
    pub fn ensure_self(&self, user_id: DocId) -> AppResult<()> {
        if self.user_id != user_id {
            return Err(AppError::Core(CoreError::Forbidden(
                "You can only modify your own account".into(),
            )));
        }
        Ok(())
    }
}

fn unauthorized(msg: &str) -> AppError {
    AppError::Core(CoreError::Unauthorized(msg.into()))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| unauthorized("Missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| unauthorized("Invalid Authorization format. Expected: Bearer <token>"))?;

        let claims = validate_token(token, &state.config.jwt)
            .map_err(|_| unauthorized("Invalid or expired token"))?;

        let session = SessionRepo::find_active(&state.pool, claims.jti)
            .await?
            .filter(|s| s.user_id == claims.sub)
            .ok_or_else(|| unauthorized("Session has ended"))?;

        Ok(AuthUser {
            user_id: session.user_id,
            session_id: session.id,
        })
    }
}
