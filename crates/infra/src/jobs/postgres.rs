//! Postgres-backed job store.
//!
//! Records live in a single `job` table. Status is stored as its upper-case
//! name so the table stays readable from `psql`.
//!
//! ## Sync boundary
//!
//! `JobStore` is synchronous because the start pipeline is thread-bound. The
//! adapter runs its async queries through the current tokio runtime handle, so
//! it must be called from a runtime context that allows blocking (for example
//! inside `tokio::task::spawn_blocking`).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::instrument;

use joblock_core::{Job, JobId, JobStatus};

use super::store::{JobStore, JobStoreError};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS job (
    id          BIGSERIAL PRIMARY KEY,
    name        TEXT NOT NULL,
    start_date  TIMESTAMPTZ NULL,
    end_date    TIMESTAMPTZ NULL,
    status      TEXT NOT NULL
)
"#;

/// Postgres-backed job store.
#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: Arc<PgPool>,
}

impl PostgresJobStore {
    /// Create a new PostgresJobStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the `job` table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), JobStoreError> {
        sqlx::query(CREATE_TABLE)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    pub async fn fetch_all(&self) -> Result<Vec<Job>, JobStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, start_date, end_date, status
            FROM job
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_all", e))?;

        rows.iter().map(job_from_row).collect()
    }

    #[instrument(skip(self), fields(job_id = %id), err)]
    pub async fn fetch_one(&self, id: JobId) -> Result<Option<Job>, JobStoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, start_date, end_date, status
            FROM job
            WHERE id = $1
            "#,
        )
        .bind(id.value())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_id", e))?;

        row.as_ref().map(job_from_row).transpose()
    }

    #[instrument(skip(self, job), fields(job_id = ?job.id, status = %job.status), err)]
    pub async fn upsert(&self, job: Job) -> Result<Job, JobStoreError> {
        let row = match job.id {
            None => sqlx::query(
                r#"
                INSERT INTO job (name, start_date, end_date, status)
                VALUES ($1, $2, $3, $4)
                RETURNING id, name, start_date, end_date, status
                "#,
            )
            .bind(&job.name)
            .bind(job.start_date)
            .bind(job.end_date)
            .bind(job.status.as_str())
            .fetch_one(&*self.pool)
            .await,
            Some(id) => sqlx::query(
                r#"
                INSERT INTO job (id, name, start_date, end_date, status)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (id) DO UPDATE SET
                    name = EXCLUDED.name,
                    start_date = EXCLUDED.start_date,
                    end_date = EXCLUDED.end_date,
                    status = EXCLUDED.status
                RETURNING id, name, start_date, end_date, status
                "#,
            )
            .bind(id.value())
            .bind(&job.name)
            .bind(job.start_date)
            .bind(job.end_date)
            .bind(job.status.as_str())
            .fetch_one(&*self.pool)
            .await,
        }
        .map_err(|e| map_sqlx_error("save", e))?;

        job_from_row(&row)
    }
}

fn job_from_row(row: &PgRow) -> Result<Job, JobStoreError> {
    let decode = |e: sqlx::Error| JobStoreError::Storage(format!("failed to decode job row: {e}"));

    let id: i64 = row.try_get("id").map_err(decode)?;
    let status: String = row.try_get("status").map_err(decode)?;
    let status = JobStatus::parse(&status)
        .ok_or_else(|| JobStoreError::Storage(format!("unknown job status {status:?}")))?;

    Ok(Job {
        id: Some(JobId::new(id)),
        name: row.try_get("name").map_err(decode)?,
        status,
        start_date: row.try_get::<Option<DateTime<Utc>>, _>("start_date").map_err(decode)?,
        end_date: row.try_get::<Option<DateTime<Utc>>, _>("end_date").map_err(decode)?,
    })
}

fn map_sqlx_error(operation: &str, e: sqlx::Error) -> JobStoreError {
    match e {
        sqlx::Error::PoolClosed => JobStoreError::Storage(format!("{operation}: pool closed")),
        other => JobStoreError::Storage(format!("{operation}: {other}")),
    }
}

fn runtime() -> Result<tokio::runtime::Handle, JobStoreError> {
    tokio::runtime::Handle::try_current().map_err(|_| {
        JobStoreError::Storage(
            "PostgresJobStore requires a tokio runtime context".to_string(),
        )
    })
}

impl JobStore for PostgresJobStore {
    fn find_all(&self) -> Result<Vec<Job>, JobStoreError> {
        runtime()?.block_on(self.fetch_all())
    }

    fn find_by_id(&self, id: JobId) -> Result<Option<Job>, JobStoreError> {
        runtime()?.block_on(self.fetch_one(id))
    }

    fn save(&self, job: Job) -> Result<Job, JobStoreError> {
        runtime()?.block_on(self.upsert(job))
    }
}
