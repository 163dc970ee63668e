//! Handlers for the producer-facing `/print-jobs` resource.
//!
//! All endpoints require user authentication via [`AuthUser`]. Handlers
//! are thin adapters: every lifecycle rule lives in the queue engine.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use parkprint_core::types::DbId;
use parkprint_db::models::print_job::{EnqueueJob, JobListQuery};
use parkprint_db::models::status::PrintJobStatus;
use parkprint_db::queue::QueueEngine;

use crate::error::AppResult;
use crate::extract::AppJson;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Request body for `POST /print-jobs/{id}/cancel`.
#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

/// One entry of the status enumeration.
#[derive(Debug, Serialize)]
pub struct StatusInfo {
    pub id: i16,
    pub name: &'static str,
    pub terminal: bool,
}

/// Response for `GET /print-jobs/stats`.
#[derive(Debug, Serialize)]
pub struct QueueStatsResponse {
    pub total_queued: i64,
    pub total_claimed: i64,
    pub total_printing: i64,
    pub total_completed: i64,
    pub total_failed: i64,
    pub total_cancelled: i64,
}

// ---------------------------------------------------------------------------
// Enqueue
// ---------------------------------------------------------------------------

/// POST /api/v1/print-jobs
///
/// Enqueue a new print job. Returns 201 with `{job, duplicate: false}`,
/// or 200 with `{job, duplicate: true}` when the supplied `job_key`
/// matches an existing job (idempotent resubmission).
pub async fn enqueue_job(
    auth: AuthUser,
    State(state): State<AppState>,
    AppJson(input): AppJson<EnqueueJob>,
) -> AppResult<impl IntoResponse> {
    let outcome = QueueEngine::enqueue(&state.pool, &input, &auth.as_requester()).await?;

    let status = if outcome.duplicate {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((status, Json(DataResponse { data: outcome })))
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/v1/print-jobs
///
/// List jobs newest-created first. Supports `status_id`, `job_type`,
/// `limit`, `since`, and `search` query parameters. Read-only.
pub async fn list_jobs(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs = QueueEngine::list(&state.pool, &params).await?;
    Ok(Json(DataResponse { data: jobs }))
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/v1/print-jobs/{id}
///
/// Get a single job together with its recent event history.
pub async fn get_job(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job_with_events = QueueEngine::get(&state.pool, job_id).await?;
    Ok(Json(DataResponse {
        data: job_with_events,
    }))
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// POST /api/v1/print-jobs/{id}/cancel
///
/// Cancel a non-terminal job. Returns 409 `INVALID_STATE_TRANSITION` if
/// the job already reached a terminal state.
pub async fn cancel_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    body: Option<Json<CancelRequest>>,
) -> AppResult<impl IntoResponse> {
    let reason = body.and_then(|Json(req)| req.reason);

    let job = QueueEngine::cancel(&state.pool, job_id, &auth.login, reason.as_deref()).await?;

    tracing::info!(job_id, user_id = auth.user_id, "Print job cancelled by producer");

    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Statuses
// ---------------------------------------------------------------------------

/// GET /api/v1/print-jobs/statuses
///
/// Enumerate the valid job statuses. Static data; handy for UIs building
/// filters without hardcoding ids.
pub async fn list_statuses(_auth: AuthUser) -> AppResult<impl IntoResponse> {
    let statuses: Vec<StatusInfo> = PrintJobStatus::ALL
        .iter()
        .map(|s| StatusInfo {
            id: s.id(),
            name: s.name(),
            terminal: s.is_terminal(),
        })
        .collect();
    Ok(Json(DataResponse { data: statuses }))
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// GET /api/v1/print-jobs/stats
///
/// Per-status job counts for dashboards.
pub async fn queue_stats(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let counts = QueueEngine::status_counts(&state.pool).await?;

    let total_for = |status: PrintJobStatus| {
        counts
            .iter()
            .find(|c| c.status_id == status.id())
            .map_or(0, |c| c.count)
    };

    let resp = QueueStatsResponse {
        total_queued: total_for(PrintJobStatus::Queued),
        total_claimed: total_for(PrintJobStatus::Claimed),
        total_printing: total_for(PrintJobStatus::Printing),
        total_completed: total_for(PrintJobStatus::Completed),
        total_failed: total_for(PrintJobStatus::Failed),
        total_cancelled: total_for(PrintJobStatus::Cancelled),
    };

    Ok(Json(DataResponse { data: resp }))
}
