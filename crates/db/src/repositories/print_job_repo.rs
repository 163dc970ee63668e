//! Repository for the `print_jobs` table.
//!
//! Exposes only the atomic operations the queue engine needs: insert with
//! idempotency-key dedupe, claim via `FOR UPDATE SKIP LOCKED`, and
//! conditional single-row transitions keyed on `(id, expected status,
//! expected claimed_by)`. Callers never get a bare read-then-write path to
//! the table; that concurrency contract lives here, not in the handlers.
//!
//! Mutating methods take a [`Transaction`] so the engine can append the
//! matching event row atomically with the job update.

use sqlx::{PgPool, Postgres, Transaction};

use parkprint_core::print_queue::{DEFAULT_MAX_RETRIES, PRIORITY_NORMAL};
use parkprint_core::types::DbId;

use crate::models::print_job::{
    ClaimFilter, EnqueueJob, JobListQuery, PrintJob, Requester, StatusCount,
};
use crate::models::status::PrintJobStatus;

/// Column list for `print_jobs` queries.
const COLUMNS: &str = "\
    id, job_key, job_type, payload, printer_profile, priority, status_id, \
    attempts, max_retries, scheduled_for, \
    claimed_by, claimed_at, started_at, completed_at, failed_at, cancelled_at, \
    last_error, requested_by, requested_by_login, requested_by_name, \
    created_at, updated_at";

/// Provides atomic store operations for print jobs.
pub struct PrintJobRepo;

impl PrintJobRepo {
    /// Insert a new queued job.
    ///
    /// Returns `None` when `job_key` is set and a job with that key already
    /// exists: the `ON CONFLICT DO NOTHING` clause makes the existence
    /// check atomic with the insert, so two concurrent enqueues with the
    /// same key can never both create a row.
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        input: &EnqueueJob,
        requester: &Requester,
    ) -> Result<Option<PrintJob>, sqlx::Error> {
        let query = format!(
            "INSERT INTO print_jobs \
                 (job_key, job_type, payload, printer_profile, priority, status_id, \
                  max_retries, scheduled_for, requested_by, requested_by_login, requested_by_name) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, NOW()), $9, $10, $11) \
             ON CONFLICT (job_key) WHERE job_key IS NOT NULL DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PrintJob>(&query)
            .bind(&input.job_key)
            .bind(&input.job_type)
            .bind(&input.payload)
            .bind(&input.printer_profile)
            .bind(input.priority.unwrap_or(PRIORITY_NORMAL))
            .bind(PrintJobStatus::Queued.id())
            .bind(input.max_retries.unwrap_or(DEFAULT_MAX_RETRIES))
            .bind(input.scheduled_for)
            .bind(requester.id)
            .bind(&requester.login)
            .bind(&requester.name)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Find a job by its idempotency key.
    pub async fn find_by_job_key(
        tx: &mut Transaction<'_, Postgres>,
        job_key: &str,
    ) -> Result<Option<PrintJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM print_jobs WHERE job_key = $1");
        sqlx::query_as::<_, PrintJob>(&query)
            .bind(job_key)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<PrintJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM print_jobs WHERE id = $1");
        sqlx::query_as::<_, PrintJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Transaction-scoped variant of [`Self::find_by_id`], used by the
    /// engine to diagnose a conditional update that matched no row.
    pub async fn find_by_id_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
    ) -> Result<Option<PrintJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM print_jobs WHERE id = $1");
        sqlx::query_as::<_, PrintJob>(&query)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Lock and read a job row within the caller's transaction.
    ///
    /// `FOR UPDATE` blocks concurrent transitions until the transaction
    /// ends, so the status read here is exactly the status a subsequent
    /// conditional update in the same transaction sees.
    pub async fn find_by_id_for_update(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
    ) -> Result<Option<PrintJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM print_jobs WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, PrintJob>(&query)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Atomically claim the best eligible queued job for an agent.
    ///
    /// Eligible means: queued, due (`scheduled_for <= NOW()`), and matching
    /// the agent's type/profile filters (a job with no printer profile
    /// matches any agent). Selection order is highest priority first, then
    /// oldest created, so urgent jobs are not starved behind a backlog.
    ///
    /// `FOR UPDATE SKIP LOCKED` inside the subselect makes concurrent
    /// claims race-free: at most one agent's UPDATE sees any given row.
    pub async fn claim_next(
        tx: &mut Transaction<'_, Postgres>,
        agent_id: &str,
        filter: &ClaimFilter,
    ) -> Result<Option<PrintJob>, sqlx::Error> {
        let query = format!(
            "UPDATE print_jobs \
             SET status_id = $1, claimed_by = $2, claimed_at = NOW(), \
                 attempts = attempts + 1, updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM print_jobs \
                 WHERE status_id = $3 \
                   AND scheduled_for <= NOW() \
                   AND ($4::text[] IS NULL OR job_type = ANY($4)) \
                   AND ($5::text[] IS NULL OR printer_profile IS NULL \
                        OR printer_profile = ANY($5)) \
                 ORDER BY priority DESC, created_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PrintJob>(&query)
            .bind(PrintJobStatus::Claimed.id())
            .bind(agent_id)
            .bind(PrintJobStatus::Queued.id())
            .bind(filter.job_types.as_deref())
            .bind(filter.printer_profiles.as_deref())
            .fetch_optional(&mut **tx)
            .await
    }

    /// Find a job the agent already holds (claimed or printing), so a
    /// restarted agent can resume its own lease. Read-only: no transition
    /// happens and `attempts` is not bumped.
    pub async fn find_assigned(
        pool: &PgPool,
        agent_id: &str,
        filter: &ClaimFilter,
    ) -> Result<Option<PrintJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM print_jobs \
             WHERE status_id IN ($1, $2) \
               AND claimed_by = $3 \
               AND ($4::text[] IS NULL OR job_type = ANY($4)) \
               AND ($5::text[] IS NULL OR printer_profile IS NULL \
                    OR printer_profile = ANY($5)) \
             ORDER BY priority DESC, created_at ASC \
             LIMIT 1"
        );
        sqlx::query_as::<_, PrintJob>(&query)
            .bind(PrintJobStatus::Claimed.id())
            .bind(PrintJobStatus::Printing.id())
            .bind(agent_id)
            .bind(filter.job_types.as_deref())
            .bind(filter.printer_profiles.as_deref())
            .fetch_optional(pool)
            .await
    }

    /// Transition a claimed job to printing. Conditional on the caller
    /// being the current holder; returns `None` if the guard fails.
    pub async fn mark_printing(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
        agent_id: &str,
    ) -> Result<Option<PrintJob>, sqlx::Error> {
        let query = format!(
            "UPDATE print_jobs \
             SET status_id = $1, started_at = NOW(), updated_at = NOW() \
             WHERE id = $2 AND status_id = $3 AND claimed_by = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PrintJob>(&query)
            .bind(PrintJobStatus::Printing.id())
            .bind(id)
            .bind(PrintJobStatus::Claimed.id())
            .bind(agent_id)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Transition a printing job to completed, clearing the claimant.
    pub async fn complete(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
        agent_id: &str,
    ) -> Result<Option<PrintJob>, sqlx::Error> {
        let query = format!(
            "UPDATE print_jobs \
             SET status_id = $1, completed_at = NOW(), claimed_by = NULL, \
                 updated_at = NOW() \
             WHERE id = $2 AND status_id = $3 AND claimed_by = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PrintJob>(&query)
            .bind(PrintJobStatus::Completed.id())
            .bind(id)
            .bind(PrintJobStatus::Printing.id())
            .bind(agent_id)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Record a failure reported by the holding agent.
    ///
    /// A single conditional update decides both outcomes: if retries
    /// remain (`attempts < max_retries + 1`) the job re-enters the
    /// claimable pool with `scheduled_for` pushed `delay_secs` into the
    /// future and its claim timestamps reset; otherwise it becomes
    /// terminally failed. `last_error` is recorded either way.
    pub async fn fail(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
        agent_id: &str,
        error_message: &str,
        delay_secs: i64,
    ) -> Result<Option<PrintJob>, sqlx::Error> {
        let query = format!(
            "UPDATE print_jobs \
             SET status_id     = CASE WHEN attempts >= max_retries + 1 THEN $1 ELSE $2 END, \
                 failed_at     = CASE WHEN attempts >= max_retries + 1 THEN NOW() ELSE failed_at END, \
                 scheduled_for = CASE WHEN attempts >= max_retries + 1 THEN scheduled_for \
                                      ELSE NOW() + make_interval(secs => $3::float8) END, \
                 claimed_by    = NULL, \
                 claimed_at    = CASE WHEN attempts >= max_retries + 1 THEN claimed_at ELSE NULL END, \
                 started_at    = CASE WHEN attempts >= max_retries + 1 THEN started_at ELSE NULL END, \
                 last_error    = $4, \
                 updated_at    = NOW() \
             WHERE id = $5 AND status_id IN ($6, $7) AND claimed_by = $8 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PrintJob>(&query)
            .bind(PrintJobStatus::Failed.id())
            .bind(PrintJobStatus::Queued.id())
            .bind(delay_secs as f64)
            .bind(error_message)
            .bind(id)
            .bind(PrintJobStatus::Claimed.id())
            .bind(PrintJobStatus::Printing.id())
            .bind(agent_id)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Cancel a job if it is not already in a terminal state.
    ///
    /// A narrow compare-and-swap: it never preempts an agent mid-print,
    /// it only removes the job from further lifecycle progress.
    pub async fn cancel(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
    ) -> Result<Option<PrintJob>, sqlx::Error> {
        let query = format!(
            "UPDATE print_jobs \
             SET status_id = $1, cancelled_at = NOW(), claimed_by = NULL, \
                 updated_at = NOW() \
             WHERE id = $2 AND status_id IN ($3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PrintJob>(&query)
            .bind(PrintJobStatus::Cancelled.id())
            .bind(id)
            .bind(PrintJobStatus::Queued.id())
            .bind(PrintJobStatus::Claimed.id())
            .bind(PrintJobStatus::Printing.id())
            .fetch_optional(&mut **tx)
            .await
    }

    /// List jobs newest-created first with optional filters and a clamped
    /// limit. Read-only.
    pub async fn list(pool: &PgPool, params: &JobListQuery) -> Result<Vec<PrintJob>, sqlx::Error> {
        let limit = parkprint_core::print_queue::clamp_list_limit(params.limit);

        // Build the WHERE clause and track the next bind parameter index.
        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;

        if params.status_id.is_some() {
            conditions.push(format!("status_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.job_type.is_some() {
            conditions.push(format!("job_type = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.since.is_some() {
            conditions.push(format!("created_at >= ${bind_idx}"));
            bind_idx += 1;
        }
        if params.search.is_some() {
            conditions.push(format!(
                "(job_key ILIKE ${bind_idx} OR job_type ILIKE ${bind_idx} \
                 OR requested_by_login ILIKE ${bind_idx})"
            ));
            bind_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {COLUMNS} FROM print_jobs \
             {where_clause} \
             ORDER BY created_at DESC \
             LIMIT ${bind_idx}"
        );

        let mut q = sqlx::query_as::<_, PrintJob>(&query);

        if let Some(sid) = params.status_id {
            q = q.bind(sid);
        }
        if let Some(ref jt) = params.job_type {
            q = q.bind(jt);
        }
        if let Some(since) = params.since {
            q = q.bind(since);
        }
        if let Some(ref search) = params.search {
            q = q.bind(format!("%{}%", escape_like(search)));
        }

        q.bind(limit).fetch_all(pool).await
    }

    /// Row counts per status, for the stats endpoint.
    pub async fn status_counts(pool: &PgPool) -> Result<Vec<StatusCount>, sqlx::Error> {
        sqlx::query_as::<_, StatusCount>(
            "SELECT status_id, COUNT(*) AS count FROM print_jobs \
             GROUP BY status_id ORDER BY status_id",
        )
        .fetch_all(pool)
        .await
    }
}

/// Escape LIKE wildcards in user-supplied search text.
fn escape_like(input: &str) -> String {
    input.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
