//! Repository for the `print_job_events` table.
//!
//! Append and read only; there is deliberately no update or delete here.

use sqlx::{PgPool, Postgres, Transaction};

use parkprint_core::types::DbId;

use crate::models::job_event::JobEvent;
use crate::models::status::StatusId;

/// Column list for `print_job_events` queries.
const COLUMNS: &str =
    "id, job_id, from_status_id, to_status_id, actor, detail, occurred_at";

/// Provides append/read operations for the job event trail.
pub struct JobEventRepo;

impl JobEventRepo {
    /// Append a transition event. Takes the engine's transaction so the
    /// event commits atomically with the job update it describes.
    pub async fn append(
        tx: &mut Transaction<'_, Postgres>,
        job_id: DbId,
        from_status_id: Option<StatusId>,
        to_status_id: StatusId,
        actor: &str,
        detail: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO print_job_events \
                 (job_id, from_status_id, to_status_id, actor, detail) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(job_id)
        .bind(from_status_id)
        .bind(to_status_id)
        .bind(actor)
        .bind(detail)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// List the most recent events for a job, newest first.
    pub async fn list_for_job(
        pool: &PgPool,
        job_id: DbId,
        limit: i64,
    ) -> Result<Vec<JobEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM print_job_events \
             WHERE job_id = $1 \
             ORDER BY occurred_at DESC, id DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, JobEvent>(&query)
            .bind(job_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
