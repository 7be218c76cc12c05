pub mod auth;
pub mod files;
pub mod health;
pub mod repositories;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/signup                          signup (public)
/// /auth/signin                          signin (public)
/// /auth/signout                         signout (requires auth)
/// /auth/check-session                   current user (requires auth)
///
/// /users/{id}                           get, update, delete (self only)
/// /users/{id}/stats                     coding statistics
/// /users/{id}/projects                  project list
/// /users/{id}/activities                activity feed
/// /users/{id}/profile                   full public profile
///
/// /repositories                         create (requires auth)
/// /repositories/accessible              owned or shared with caller
/// /repositories/user/{user_id}          list by owner
/// /repositories/{id}                    get, update, delete (owner only)
/// /repositories/{id}/collaborators      collaborator users
/// /repositories/{id}/files              files in the repository
///
/// /files                                create (requires auth)
/// /files/{id}                           get, update, delete
/// /files/{id}/execute                   submit for execution (POST)
/// /files/executions/{request_id}        poll an execution result
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/repositories", repositories::router())
        .nest("/files", files::router())
}
