//! Route definitions for the producer-facing `/print-jobs` resource.
//!
//! All endpoints require user authentication.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::print_jobs;
use crate::state::AppState;

/// Routes mounted at `/print-jobs`.
///
/// ```text
/// GET    /                -> list_jobs
/// POST   /                -> enqueue_job
/// GET    /statuses        -> list_statuses
/// GET    /stats           -> queue_stats
/// GET    /{id}            -> get_job
/// POST   /{id}/cancel     -> cancel_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(print_jobs::list_jobs).post(print_jobs::enqueue_job))
        .route("/statuses", get(print_jobs::list_statuses))
        .route("/stats", get(print_jobs::queue_stats))
        .route("/{id}", get(print_jobs::get_job))
        .route("/{id}/cancel", post(print_jobs::cancel_job))
}
