//! Postgres-backed job store.
//!
//! The store is both the queue and the system of record. All coordination
//! between the scheduler, the worker pool, and the retry manager goes
//! through it; correctness under concurrent workers rests on the
//! conditional-update claim, not on any in-process lock.

use anyhow::Result;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::job::{AnalysisJob, JobStatus, SourceKind};
use super::windows::AnalysisWindow;
use crate::models::Source;

/// Queue + record-of-truth for analysis jobs.
#[derive(Clone)]
pub struct JobStore {
    db: PgPool,
}

impl JobStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }

    /// Idempotently enqueue one job per window for a source. Windows whose
    /// (source_id, relative_start, relative_end) already exist are silently
    /// skipped, so re-scans are no-ops. Returns the number of jobs actually
    /// created.
    pub async fn enqueue_windows(
        &self,
        source: &Source,
        playback_ref: &str,
        kind: SourceKind,
        windows: &[AnalysisWindow],
    ) -> Result<usize> {
        let mut created = 0;
        for window in windows {
            let job = AnalysisJob::builder()
                .source_kind(kind)
                .source_id(source.id)
                .playback_ref(playback_ref)
                .window_start(window.start)
                .window_end(window.end)
                .relative_start(window.relative_start)
                .relative_end(window.relative_end)
                .build();

            if job.insert_if_new(&self.db).await? {
                created += 1;
            }
        }

        if created > 0 {
            debug!(
                source_id = %source.id,
                created,
                total = windows.len(),
                "enqueued analysis windows"
            );
        }

        Ok(created)
    }

    /// Claim the oldest queued job, if any.
    ///
    /// Two-step optimistic protocol: read the head of the queue, then
    /// conditionally flip it to Processing. Losing the conditional update
    /// to a concurrent worker is not an error - the claim just comes back
    /// empty and the caller's polling loop tries again next tick.
    pub async fn claim_next(&self) -> Result<Option<AnalysisJob>> {
        let Some(job) = AnalysisJob::find_next_queued(&self.db).await? else {
            return Ok(None);
        };

        if AnalysisJob::try_claim(job.id, &self.db).await? {
            Ok(Some(job))
        } else {
            debug!(job_id = %job.id, "lost claim race");
            Ok(None)
        }
    }

    pub async fn mark_succeeded(&self, job_id: Uuid, result_id: Uuid) -> Result<()> {
        AnalysisJob::mark_succeeded(job_id, result_id, &self.db).await
    }

    /// Route a fatal attempt failure to Failed, or to Dead once the
    /// attempt cap is exhausted. Returns the resulting status.
    pub async fn mark_failed(
        &self,
        job_id: Uuid,
        error: &str,
        max_attempts: i32,
    ) -> Result<JobStatus> {
        AnalysisJob::mark_failed(job_id, error, max_attempts, &self.db).await
    }

    pub async fn find_retry_candidates(&self, max_attempts: i32) -> Result<Vec<AnalysisJob>> {
        AnalysisJob::find_retry_candidates(max_attempts, &self.db).await
    }

    pub async fn requeue(&self, job_id: Uuid) -> Result<bool> {
        AnalysisJob::requeue(job_id, &self.db).await
    }

    pub async fn reclaim_stale_processing(&self, stale_after_secs: i64) -> Result<u64> {
        AnalysisJob::reclaim_stale_processing(stale_after_secs, &self.db).await
    }
}
