//! Job model for window analysis execution.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use crate::common::Record;

// ============================================================================
// Enums
// ============================================================================

/// Job lifecycle. The snake_case strings are the wire contract downstream
/// consumers match on.
///
/// Transitions: Queued -> Processing -> {Succeeded | Failed | Dead}, with
/// Failed -> Queued re-entry performed by the retry manager only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Queued,
    Processing,
    Succeeded,
    Failed,
    Dead,
}

impl JobStatus {
    /// Terminal resting states - retained forever, never reprocessed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Dead)
    }
}

/// Which addressing scheme a job's window uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "source_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Window addressed by absolute program time (epoch seconds).
    Live,
    /// Window addressed by asset-relative seconds.
    Finished,
}

// ============================================================================
// Job Model
// ============================================================================

#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct AnalysisJob {
    #[builder(default = Uuid::new_v4())]
    pub id: Uuid,

    // Addressing
    pub source_kind: SourceKind,
    pub source_id: Uuid,
    pub playback_ref: String,

    /// Window bounds in the addressing scheme of `source_kind`.
    pub window_start: i64,
    pub window_end: i64,

    /// Always source-relative. Together with `source_id` these form the
    /// dedupe key: one job row per window, ever, regardless of scheme.
    pub relative_start: i64,
    pub relative_end: i64,

    // State
    #[builder(default)]
    pub status: JobStatus,
    #[builder(default = 0)]
    pub attempts: i32,
    #[builder(default, setter(strip_option))]
    pub last_error: Option<String>,
    #[builder(default, setter(strip_option))]
    pub result_id: Option<Uuid>,

    // Timestamps
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

const JOB_COLUMNS: &str = r#"id, source_kind, source_id, playback_ref,
       window_start, window_end, relative_start, relative_end,
       status, attempts, last_error, result_id, created_at, updated_at"#;

impl AnalysisJob {
    /// Insert ignoring the window dedupe constraint. Returns true when a
    /// row was actually written - re-scheduling an already-enqueued window
    /// is a silent no-op.
    pub async fn insert_if_new(&self, db: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO analysis_jobs (
                id, source_kind, source_id, playback_ref,
                window_start, window_end, relative_start, relative_end,
                status, attempts, last_error, result_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (source_id, relative_start, relative_end) DO NOTHING
            "#,
        )
        .bind(self.id)
        .bind(self.source_kind)
        .bind(self.source_id)
        .bind(&self.playback_ref)
        .bind(self.window_start)
        .bind(self.window_end)
        .bind(self.relative_start)
        .bind(self.relative_end)
        .bind(self.status)
        .bind(self.attempts)
        .bind(&self.last_error)
        .bind(self.result_id)
        .bind(self.created_at)
        .bind(self.updated_at)
        .execute(db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Oldest queued job, if any. Step one of the claim protocol; the row
    /// may be gone by the time the conditional claim runs.
    pub async fn find_next_queued(db: &PgPool) -> Result<Option<Self>> {
        let job = sqlx::query_as::<_, Self>(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM analysis_jobs
            WHERE status = 'queued'
            ORDER BY created_at ASC
            LIMIT 1
            "#
        ))
        .fetch_optional(db)
        .await?;

        Ok(job)
    }

    /// Step two of the claim protocol: conditional transition to
    /// Processing. Zero rows affected means another worker won the race.
    pub async fn try_claim(id: Uuid, db: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE analysis_jobs
            SET status = 'processing',
                updated_at = NOW()
            WHERE id = $1 AND status = 'queued'
            "#,
        )
        .bind(id)
        .execute(db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Terminal success: record the result back-reference and clear the
    /// last failure message.
    pub async fn mark_succeeded(id: Uuid, result_id: Uuid, db: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE analysis_jobs
            SET status = 'succeeded',
                result_id = $2,
                last_error = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(result_id)
        .execute(db)
        .await?;

        Ok(())
    }

    /// Record a fatal attempt failure: bump `attempts`, keep the error for
    /// diagnostics, and land in Failed while attempts remain or Dead once
    /// the cap is reached. Returns the resulting status.
    pub async fn mark_failed(
        id: Uuid,
        error: &str,
        max_attempts: i32,
        db: &PgPool,
    ) -> Result<JobStatus> {
        let status = sqlx::query_scalar::<_, JobStatus>(
            r#"
            UPDATE analysis_jobs
            SET attempts = attempts + 1,
                last_error = $2,
                status = CASE
                    WHEN attempts + 1 < $3 THEN 'failed'::job_status
                    ELSE 'dead'::job_status
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING status
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(max_attempts)
        .fetch_one(db)
        .await?;

        Ok(status)
    }

    /// Failed jobs still under the attempt cap, oldest failure first.
    /// Jobs at the cap were already routed to Dead by the failure path,
    /// so this never sees them.
    pub async fn find_retry_candidates(max_attempts: i32, db: &PgPool) -> Result<Vec<Self>> {
        let jobs = sqlx::query_as::<_, Self>(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM analysis_jobs
            WHERE status = 'failed'
              AND attempts < $1
            ORDER BY updated_at ASC
            "#
        ))
        .bind(max_attempts)
        .fetch_all(db)
        .await?;

        Ok(jobs)
    }

    /// Retry re-entry: Failed -> Queued, retaining attempts and last_error
    /// for diagnostics. Conditional on still being Failed.
    pub async fn requeue(id: Uuid, db: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE analysis_jobs
            SET status = 'queued',
                updated_at = NOW()
            WHERE id = $1 AND status = 'failed'
            "#,
        )
        .bind(id)
        .execute(db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Return Processing rows abandoned by a crashed worker to the queue.
    /// Attempts are not incremented - an abandoned job was never observed
    /// to fail. Returns the number of reclaimed rows.
    pub async fn reclaim_stale_processing(stale_after_secs: i64, db: &PgPool) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE analysis_jobs
            SET status = 'queued',
                updated_at = NOW()
            WHERE status = 'processing'
              AND updated_at < NOW() - ($1 || ' seconds')::INTERVAL
            "#,
        )
        .bind(stale_after_secs.to_string())
        .execute(db)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl Record for AnalysisJob {
    const TABLE: &'static str = "analysis_jobs";
    type Id = Uuid;

    async fn find_by_id(id: Uuid, db: &PgPool) -> Result<Self> {
        let job = sqlx::query_as::<_, Self>(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM analysis_jobs
            WHERE id = $1
            "#
        ))
        .bind(id)
        .fetch_one(db)
        .await?;

        Ok(job)
    }

    async fn insert(&self, db: &PgPool) -> Result<Self> {
        let job = sqlx::query_as::<_, Self>(&format!(
            r#"
            INSERT INTO analysis_jobs (
                id, source_kind, source_id, playback_ref,
                window_start, window_end, relative_start, relative_end,
                status, attempts, last_error, result_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(self.id)
        .bind(self.source_kind)
        .bind(self.source_id)
        .bind(&self.playback_ref)
        .bind(self.window_start)
        .bind(self.window_end)
        .bind(self.relative_start)
        .bind(self.relative_end)
        .bind(self.status)
        .bind(self.attempts)
        .bind(&self.last_error)
        .bind(self.result_id)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_one(db)
        .await?;

        Ok(job)
    }

    async fn update(&self, db: &PgPool) -> Result<Self> {
        let job = sqlx::query_as::<_, Self>(&format!(
            r#"
            UPDATE analysis_jobs SET
                source_kind = $1, source_id = $2, playback_ref = $3,
                window_start = $4, window_end = $5,
                relative_start = $6, relative_end = $7,
                status = $8, attempts = $9, last_error = $10, result_id = $11,
                updated_at = NOW()
            WHERE id = $12
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(self.source_kind)
        .bind(self.source_id)
        .bind(&self.playback_ref)
        .bind(self.window_start)
        .bind(self.window_end)
        .bind(self.relative_start)
        .bind(self.relative_end)
        .bind(self.status)
        .bind(self.attempts)
        .bind(&self.last_error)
        .bind(self.result_id)
        .bind(self.id)
        .fetch_one(db)
        .await?;

        Ok(job)
    }
}
