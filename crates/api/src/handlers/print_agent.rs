//! Handlers for the agent-facing `/agent/print-jobs` protocol.
//!
//! Agents poll `claim` on their own interval (no blocking, no push) and
//! report progress with `printing`, `complete`, and `fail`. Every call is
//! authenticated via [`AgentIdentity`] and keyed on the agent id the
//! engine stores in `claimed_by`.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use parkprint_core::error::CoreError;
use parkprint_core::types::DbId;
use parkprint_db::models::print_job::{ClaimFilter, PrintJob};
use parkprint_db::models::status::PrintJobStatus;
use parkprint_db::queue::{QueueEngine, QueueError};

use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::middleware::agent::AgentIdentity;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Response body for `POST /agent/print-jobs/claim`.
///
/// `job` is `null` when nothing is eligible; the agent simply polls again
/// later.
#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub job: Option<PrintJob>,
}

/// Optional free-form detail an agent attaches to a progress report.
#[derive(Debug, Default, Deserialize)]
pub struct AgentReport {
    pub details: Option<String>,
}

/// Request body for `POST /agent/print-jobs/{id}/fail`.
#[derive(Debug, Deserialize)]
pub struct FailReport {
    pub error_message: String,
    /// Override the default exponential backoff before the next attempt.
    pub retry_delay_secs: Option<i64>,
}

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

/// POST /api/v1/agent/print-jobs/claim
///
/// Atomically claim the best eligible job for this agent, or return
/// `{job: null}` when nothing is due. Two agents can never claim the same
/// job.
pub async fn claim_job(
    agent: AgentIdentity,
    State(state): State<AppState>,
    body: Option<Json<ClaimFilter>>,
) -> AppResult<impl IntoResponse> {
    let filter = body.map(|Json(f)| f).unwrap_or_default();

    let job = QueueEngine::claim(&state.pool, &agent.agent_id, &filter).await?;

    Ok(Json(DataResponse {
        data: ClaimResponse { job },
    }))
}

// ---------------------------------------------------------------------------
// Printing
// ---------------------------------------------------------------------------

/// POST /api/v1/agent/print-jobs/{id}/printing
///
/// Report that physical printing has started. The caller must be the
/// current holder.
pub async fn mark_printing(
    agent: AgentIdentity,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    body: Option<Json<AgentReport>>,
) -> AppResult<impl IntoResponse> {
    let details = body.and_then(|Json(r)| r.details);

    let job =
        QueueEngine::mark_printing(&state.pool, job_id, &agent.agent_id, details.as_deref())
            .await?;

    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Complete
// ---------------------------------------------------------------------------

/// POST /api/v1/agent/print-jobs/{id}/complete
///
/// Report successful printing. If the job was cancelled while the agent
/// held it, the report is acknowledged as a no-op (200 with the cancelled
/// job) so the agent does not retry; any other illegal transition is a
/// real error.
pub async fn complete_job(
    agent: AgentIdentity,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    body: Option<Json<AgentReport>>,
) -> AppResult<impl IntoResponse> {
    let details = body.and_then(|Json(r)| r.details);

    let result =
        QueueEngine::complete(&state.pool, job_id, &agent.agent_id, details.as_deref()).await;

    let job = reconcile_cancelled_race(&state, job_id, &agent, result).await?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Fail
// ---------------------------------------------------------------------------

/// POST /api/v1/agent/print-jobs/{id}/fail
///
/// Report a printing failure. The engine either requeues the job with a
/// backoff or marks it terminally failed once retries are exhausted.
/// Cancellation races are acknowledged the same way as for `complete`.
pub async fn fail_job(
    agent: AgentIdentity,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    AppJson(report): AppJson<FailReport>,
) -> AppResult<impl IntoResponse> {
    let result = QueueEngine::fail(
        &state.pool,
        job_id,
        &agent.agent_id,
        &report.error_message,
        report.retry_delay_secs,
    )
    .await;

    let job = reconcile_cancelled_race(&state, job_id, &agent, result).await?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Convert an `InvalidStateTransition` on an already-cancelled job into a
/// no-op acknowledgement.
///
/// Cancel never preempts an agent mid-print, so an agent may legitimately
/// report an outcome for a job a producer cancelled moments earlier. That
/// report changes nothing and must not look retryable to the agent.
async fn reconcile_cancelled_race(
    state: &AppState,
    job_id: DbId,
    agent: &AgentIdentity,
    result: Result<PrintJob, QueueError>,
) -> AppResult<PrintJob> {
    match result {
        Ok(job) => Ok(job),
        Err(QueueError::Core(CoreError::InvalidStateTransition(msg))) => {
            let current = QueueEngine::get(&state.pool, job_id).await?;
            if current.job.status_id == PrintJobStatus::Cancelled.id() {
                tracing::warn!(
                    job_id,
                    agent_id = %agent.agent_id,
                    "Agent reported outcome for a cancelled job; acknowledged as no-op",
                );
                Ok(current.job)
            } else {
                Err(AppError::Core(CoreError::InvalidStateTransition(msg)))
            }
        }
        Err(other) => Err(other.into()),
    }
}
