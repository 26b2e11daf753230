//! Shared fixtures for integration tests.

use chrono::{Duration, Utc};
use pipeline_core::common::Record;
use pipeline_core::kernel::jobs::{AnalysisJob, JobStatus, SourceKind};
use pipeline_core::models::Source;
use sqlx::PgPool;
use uuid::Uuid;

/// Insert a schedulable source: ingest finished (`ready`), attached to a
/// parent stream, not yet fully scheduled.
pub async fn insert_ready_source(pool: &PgPool, is_live: bool, duration: Option<i64>) -> Source {
    let id = Uuid::new_v4();
    let source = Source {
        id,
        name: "dock-cam".to_string(),
        stream_id: Some("stream-main".to_string()),
        playback_ref: Some(format!("https://play.test/{}", id)),
        status: "ready".to_string(),
        is_live,
        duration_seconds: duration,
        started_at: Utc::now() - Duration::hours(1),
        analysis_complete: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    source.insert(pool).await.expect("Failed to insert source")
}

/// Insert a job in an arbitrary state. `age_secs` backdates `updated_at`
/// (and `created_at`) so backoff and reclaim paths can be exercised.
pub async fn insert_job(
    pool: &PgPool,
    source_id: Uuid,
    status: JobStatus,
    attempts: i32,
    window: (i64, i64),
    age_secs: i64,
) -> AnalysisJob {
    let stamp = Utc::now() - Duration::seconds(age_secs);
    let job = AnalysisJob::builder()
        .source_kind(SourceKind::Finished)
        .source_id(source_id)
        .playback_ref(format!("https://play.test/{}", source_id))
        .window_start(window.0)
        .window_end(window.1)
        .relative_start(window.0)
        .relative_end(window.1)
        .status(status)
        .attempts(attempts)
        .created_at(stamp)
        .updated_at(stamp)
        .build();
    job.insert(pool).await.expect("Failed to insert job")
}

pub async fn count_jobs_for_source(pool: &PgPool, source_id: Uuid) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM analysis_jobs WHERE source_id = $1")
        .bind(source_id)
        .fetch_one(pool)
        .await
        .expect("Failed to count jobs")
}

pub async fn jobs_for_source(pool: &PgPool, source_id: Uuid) -> Vec<AnalysisJob> {
    sqlx::query_as::<_, AnalysisJob>(
        r#"
        SELECT id, source_kind, source_id, playback_ref,
               window_start, window_end, relative_start, relative_end,
               status, attempts, last_error, result_id, created_at, updated_at
        FROM analysis_jobs
        WHERE source_id = $1
        ORDER BY relative_start ASC
        "#,
    )
    .bind(source_id)
    .fetch_all(pool)
    .await
    .expect("Failed to load jobs")
}

pub async fn reload_job(pool: &PgPool, id: Uuid) -> AnalysisJob {
    AnalysisJob::find_by_id(id, pool)
        .await
        .expect("Failed to reload job")
}
