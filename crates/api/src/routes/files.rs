//! Route definitions for the `/files` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::files;
use crate::state::AppState;

/// Routes mounted at `/files`.
///
/// ```text
/// POST   /                            -> create
/// GET    /{id}                        -> get_by_id
/// PUT    /{id}                        -> update
/// DELETE /{id}                        -> delete
/// POST   /{id}/execute                -> execute (?wait=true blocks)
/// GET    /executions/{request_id}     -> get_execution
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(files::create))
        .route(
            "/{id}",
            get(files::get_by_id)
                .put(files::update)
                .delete(files::delete),
        )
        .route("/{id}/execute", post(files::execute))
        .route("/executions/{request_id}", get(files::get_execution))
}
