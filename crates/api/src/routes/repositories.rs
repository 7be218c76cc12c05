//! Route definitions for the `/repositories` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::repositories;
use crate::state::AppState;

/// Routes mounted at `/repositories`.
///
/// ```text
/// POST   /                     -> create
/// GET    /accessible           -> list_accessible
/// GET    /user/{user_id}       -> list_by_user
/// GET    /{id}                 -> get_by_id
/// PUT    /{id}                 -> update (owner only)
/// DELETE /{id}                 -> delete (owner only)
/// GET    /{id}/collaborators   -> list_collaborators
/// GET    /{id}/files           -> list_files
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(repositories::create))
        .route("/accessible", get(repositories::list_accessible))
        .route("/user/{user_id}", get(repositories::list_by_user))
        .route(
            "/{id}",
            get(repositories::get_by_id)
                .put(repositories::update)
                .delete(repositories::delete),
        )
        .route("/{id}/collaborators", get(repositories::list_collaborators))
        .route("/{id}/files", get(repositories::list_files))
}
