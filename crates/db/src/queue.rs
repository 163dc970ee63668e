//! The queue engine: the single funnel for every print-job mutation.
//!
//! All protocol operations (producer- and agent-facing) go through the
//! functions here so the lifecycle guard table is enforced in one place.
//! Each mutation is a conditional single-row update plus an event append,
//! committed in one transaction. When a conditional update matches no row
//! the engine re-reads the job and reports a precise error: `NotFound`,
//! `InvalidStateTransition` (status has no such edge), or `Conflict`
//! (caller is not the holder).

use sqlx::{PgPool, Postgres, Transaction};

use parkprint_core::error::CoreError;
use parkprint_core::print_queue::{self, retry_backoff_secs, state_machine, JOB_EVENT_LIMIT};
use parkprint_core::types::DbId;

use crate::models::job_event::JobEvent;
use crate::models::print_job::{
    ClaimFilter, EnqueueJob, EnqueueOutcome, JobListQuery, PrintJob, Requester, StatusCount,
};
use crate::models::status::{PrintJobStatus, StatusId};
use crate::repositories::{JobEventRepo, PrintJobRepo};

/// Errors produced by queue engine operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// A job together with its recent event history.
#[derive(Debug, serde::Serialize)]
pub struct JobWithEvents {
    pub job: PrintJob,
    pub events: Vec<JobEvent>,
}

/// Stateless queue engine; durability and coordination live entirely in
/// the store.
pub struct QueueEngine;

impl QueueEngine {
    /// Enqueue a new job, or return the existing one when `job_key`
    /// duplicates a prior enqueue (idempotent resubmission is success, not
    /// an error).
    pub async fn enqueue(
        pool: &PgPool,
        input: &EnqueueJob,
        requester: &Requester,
    ) -> Result<EnqueueOutcome, QueueError> {
        print_queue::validate_enqueue(&input.job_type, &input.payload)?;

        if let Some(retries) = input.max_retries {
            if retries < 0 {
                return Err(CoreError::Validation("max_retries must be >= 0".into()).into());
            }
        }

        let mut tx = pool.begin().await?;

        match PrintJobRepo::insert(&mut tx, input, requester).await? {
            Some(job) => {
                JobEventRepo::append(
                    &mut tx,
                    job.id,
                    None,
                    PrintJobStatus::Queued.id(),
                    &requester.login,
                    Some("enqueued"),
                )
                .await?;
                tx.commit().await?;

                tracing::info!(
                    job_id = job.id,
                    job_type = %job.job_type,
                    requested_by = requester.id,
                    "Print job enqueued",
                );
                Ok(EnqueueOutcome {
                    job,
                    duplicate: false,
                })
            }
            None => {
                // The insert hit the job_key uniqueness constraint. Jobs
                // are never deleted, so the original row must exist.
                let key = input.job_key.as_deref().ok_or_else(|| {
                    CoreError::Internal("insert without job_key matched no row".into())
                })?;
                let existing = PrintJobRepo::find_by_job_key(&mut tx, key)
                    .await?
                    .ok_or_else(|| {
                        CoreError::Internal(format!("job_key {key} conflicted but no row found"))
                    })?;
                tx.commit().await?;

                tracing::debug!(
                    job_id = existing.id,
                    job_key = %key,
                    "Duplicate enqueue resolved to existing job",
                );
                Ok(EnqueueOutcome {
                    job: existing,
                    duplicate: true,
                })
            }
        }
    }

    /// Claim the best eligible job for an agent, or `None` when nothing is
    /// eligible. Never blocks waiting for work; agents poll.
    ///
    /// With `include_assigned`, a job the agent already holds is returned
    /// first (lease resumption after an agent restart). Resumption is not
    /// a transition: no event is written and `attempts` is unchanged.
    ///
    /// A job claimed but never completed or failed stays with its agent
    /// indefinitely; there is no lease expiry yet.
    pub async fn claim(
        pool: &PgPool,
        agent_id: &str,
        filter: &ClaimFilter,
    ) -> Result<Option<PrintJob>, QueueError> {
        if filter.include_assigned {
            if let Some(job) = PrintJobRepo::find_assigned(pool, agent_id, filter).await? {
                tracing::debug!(job_id = job.id, agent_id, "Agent resumed assigned job");
                return Ok(Some(job));
            }
        }

        let mut tx = pool.begin().await?;
        let claimed = PrintJobRepo::claim_next(&mut tx, agent_id, filter).await?;

        match claimed {
            Some(job) => {
                JobEventRepo::append(
                    &mut tx,
                    job.id,
                    Some(PrintJobStatus::Queued.id()),
                    PrintJobStatus::Claimed.id(),
                    agent_id,
                    None,
                )
                .await?;
                tx.commit().await?;

                tracing::info!(
                    job_id = job.id,
                    agent_id,
                    job_type = %job.job_type,
                    attempt = job.attempts,
                    "Print job claimed",
                );
                Ok(Some(job))
            }
            None => {
                tx.commit().await?;
                Ok(None)
            }
        }
    }

    /// Transition a claimed job to printing. The caller must be the
    /// current holder.
    pub async fn mark_printing(
        pool: &PgPool,
        id: DbId,
        agent_id: &str,
        detail: Option<&str>,
    ) -> Result<PrintJob, QueueError> {
        let mut tx = pool.begin().await?;

        match PrintJobRepo::mark_printing(&mut tx, id, agent_id).await? {
            Some(job) => {
                JobEventRepo::append(
                    &mut tx,
                    job.id,
                    Some(PrintJobStatus::Claimed.id()),
                    PrintJobStatus::Printing.id(),
                    agent_id,
                    detail,
                )
                .await?;
                tx.commit().await?;

                tracing::info!(job_id = id, agent_id, "Print job printing");
                Ok(job)
            }
            None => {
                let err = Self::diagnose(
                    &mut tx,
                    id,
                    &[PrintJobStatus::Claimed.id()],
                    agent_id,
                    "start printing",
                )
                .await?;
                Err(err.into())
            }
        }
    }

    /// Mark a printing job completed, clearing the claimant.
    pub async fn complete(
        pool: &PgPool,
        id: DbId,
        agent_id: &str,
        detail: Option<&str>,
    ) -> Result<PrintJob, QueueError> {
        let mut tx = pool.begin().await?;

        match PrintJobRepo::complete(&mut tx, id, agent_id).await? {
            Some(job) => {
                JobEventRepo::append(
                    &mut tx,
                    job.id,
                    Some(PrintJobStatus::Printing.id()),
                    PrintJobStatus::Completed.id(),
                    agent_id,
                    detail,
                )
                .await?;
                tx.commit().await?;

                tracing::info!(job_id = id, agent_id, "Print job completed");
                Ok(job)
            }
            None => {
                let err = Self::diagnose(
                    &mut tx,
                    id,
                    &[PrintJobStatus::Printing.id()],
                    agent_id,
                    "complete",
                )
                .await?;
                Err(err.into())
            }
        }
    }

    /// Record a failure reported by the holding agent.
    ///
    /// While retries remain the job re-enters the claimable pool with
    /// `scheduled_for` pushed into the future (explicit delay, otherwise
    /// exponential backoff on the attempt count); once attempts reach
    /// `max_retries + 1` the job becomes terminally failed.
    pub async fn fail(
        pool: &PgPool,
        id: DbId,
        agent_id: &str,
        error_message: &str,
        retry_delay_secs: Option<i64>,
    ) -> Result<PrintJob, QueueError> {
        if error_message.trim().is_empty() {
            return Err(CoreError::Validation("error_message is required".into()).into());
        }

        let mut tx = pool.begin().await?;

        // Locked read: computes the backoff delay and captures the
        // from-status for the event. The lock is held until commit, so the
        // status recorded in the event is exactly the one the conditional
        // UPDATE below transitions from.
        let current = PrintJobRepo::find_by_id_for_update(&mut tx, id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "PrintJob",
                id,
            })?;

        let delay = retry_delay_secs
            .unwrap_or_else(|| retry_backoff_secs(current.attempts))
            .max(0);

        match PrintJobRepo::fail(&mut tx, id, agent_id, error_message, delay).await? {
            Some(job) => {
                let exhausted = job.status_id == PrintJobStatus::Failed.id();
                let detail = if exhausted {
                    format!("{error_message} (retries exhausted)")
                } else {
                    format!("{error_message} (retry in {delay}s)")
                };
                JobEventRepo::append(
                    &mut tx,
                    job.id,
                    Some(current.status_id),
                    job.status_id,
                    agent_id,
                    Some(&detail),
                )
                .await?;
                tx.commit().await?;

                tracing::warn!(
                    job_id = id,
                    agent_id,
                    attempts = job.attempts,
                    exhausted,
                    error = %error_message,
                    "Print job failed",
                );
                Ok(job)
            }
            None => {
                let err = Self::diagnose(
                    &mut tx,
                    id,
                    &[PrintJobStatus::Claimed.id(), PrintJobStatus::Printing.id()],
                    agent_id,
                    "fail",
                )
                .await?;
                Err(err.into())
            }
        }
    }

    /// Cancel a non-terminal job. Never preempts an agent mid-print: an
    /// agent that already holds the job may still report completion, which
    /// will then be rejected with `InvalidStateTransition`.
    pub async fn cancel(
        pool: &PgPool,
        id: DbId,
        actor: &str,
        reason: Option<&str>,
    ) -> Result<PrintJob, QueueError> {
        let mut tx = pool.begin().await?;

        // Locked read: the from-status captured here cannot change before
        // the conditional update below runs.
        let current = PrintJobRepo::find_by_id_for_update(&mut tx, id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "PrintJob",
                id,
            })?;

        match PrintJobRepo::cancel(&mut tx, id).await? {
            Some(job) => {
                JobEventRepo::append(
                    &mut tx,
                    job.id,
                    Some(current.status_id),
                    PrintJobStatus::Cancelled.id(),
                    actor,
                    reason,
                )
                .await?;
                tx.commit().await?;

                tracing::info!(job_id = id, actor, "Print job cancelled");
                Ok(job)
            }
            None => {
                // The row is locked, so the CAS can only have failed
                // because the job was already terminal at read time.
                Err(CoreError::InvalidStateTransition(format!(
                    "Cannot cancel job {id} in terminal status {}",
                    state_machine::status_name(current.status_id)
                ))
                .into())
            }
        }
    }

    /// Fetch a job and its recent event history.
    pub async fn get(pool: &PgPool, id: DbId) -> Result<JobWithEvents, QueueError> {
        let job = PrintJobRepo::find_by_id(pool, id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "PrintJob",
                id,
            })?;
        let events = JobEventRepo::list_for_job(pool, id, JOB_EVENT_LIMIT).await?;
        Ok(JobWithEvents { job, events })
    }

    /// List jobs, newest first. Read-only, no side effects.
    pub async fn list(pool: &PgPool, params: &JobListQuery) -> Result<Vec<PrintJob>, QueueError> {
        Ok(PrintJobRepo::list(pool, params).await?)
    }

    /// Per-status job counts.
    pub async fn status_counts(pool: &PgPool) -> Result<Vec<StatusCount>, QueueError> {
        Ok(PrintJobRepo::status_counts(pool).await?)
    }

    /// Explain why a conditional agent transition matched no row.
    ///
    /// A current status outside `legal_from` yields
    /// `InvalidStateTransition`; a legal status with a different (or no)
    /// holder yields `Conflict`. The distinction lets callers tell
    /// "operation not valid here" apart from "someone else owns this job".
    async fn diagnose(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
        legal_from: &[StatusId],
        agent_id: &str,
        operation: &str,
    ) -> Result<CoreError, sqlx::Error> {
        let Some(current) = PrintJobRepo::find_by_id_tx(tx, id).await? else {
            return Ok(CoreError::NotFound {
                entity: "PrintJob",
                id,
            });
        };

        if !legal_from.contains(&current.status_id) {
            return Ok(CoreError::InvalidStateTransition(format!(
                "Cannot {operation} job {id} in status {}",
                state_machine::status_name(current.status_id)
            )));
        }

        Ok(match current.claimed_by.as_deref() {
            Some(holder) if holder != agent_id => CoreError::Conflict(format!(
                "Job {id} is held by agent {holder}, not {agent_id}"
            )),
            Some(_) => CoreError::Internal(format!(
                "conditional update for {operation} on job {id} matched no row"
            )),
            None => CoreError::Conflict(format!("Job {id} has no claimant")),
        })
    }
}
