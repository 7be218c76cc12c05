//! Route definitions for the `/users` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::users;
use crate::state::AppState;

/// Routes mounted at `/users`.
///
/// ```text
/// GET    /{id}             -> get_by_id
/// PUT    /{id}             -> update (self only)
/// DELETE /{id}             -> delete (self only)
/// GET    /{id}/stats       -> get_stats
/// GET    /{id}/projects    -> get_projects
/// GET    /{id}/activities  -> get_activities
/// GET    /{id}/profile     -> get_profile
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{id}",
            get(users::get_by_id)
                .put(users::update)
                .delete(users::delete),
        )
        .route("/{id}/stats", get(users::get_stats))
        .route("/{id}/projects", get(users::get_projects))
        .route("/{id}/activities", get(users::get_activities))
        .route("/{id}/profile", get(users::get_profile))
}
