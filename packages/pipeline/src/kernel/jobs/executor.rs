//! Per-job execution pipeline.
//!
//! One claimed job runs through: segment fetch + transcode, concurrent
//! fan-out to the analyzers, result persistence, and a terminal (or
//! retryable) status transition. The executor holds no mutable state
//! across jobs; every side effect lands at the job store boundary.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::job::{AnalysisJob, JobStatus, SourceKind};
use super::store::JobStore;
use crate::kernel::traits::SegmentRequest;
use crate::kernel::PipelineKernel;
use crate::models::{AnalysisResult, DetectionFrame};

/// Why an attempt failed. All variants route to the same failure path;
/// the distinction exists for operators reading `last_error`.
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("segment fetch failed: {0}")]
    Transport(anyhow::Error),
    #[error("analysis failed: {0}")]
    Analysis(anyhow::Error),
    #[error("persisting result failed: {0}")]
    Persistence(anyhow::Error),
}

/// Configuration for job execution.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Attempts before a job is dead-lettered
    pub max_attempts: i32,
    /// Bound on segment fetch + transcode
    pub segment_timeout: Duration,
    /// Bound on each analyzer call, independently
    pub analysis_timeout: Duration,
}

/// Executes one claimed job at a time.
pub struct JobExecutor {
    kernel: Arc<PipelineKernel>,
    store: JobStore,
    config: ExecutorConfig,
}

impl JobExecutor {
    pub fn new(kernel: Arc<PipelineKernel>, store: JobStore, config: ExecutorConfig) -> Self {
        Self {
            kernel,
            store,
            config,
        }
    }

    /// Execute a claimed job and resolve its status. Never returns an
    /// error: every outcome is absorbed into the job row, and a status
    /// write that itself fails leaves the row in Processing (recovered
    /// later by the stale-processing reclaim).
    pub async fn execute(&self, job: AnalysisJob) {
        let job_id = job.id;

        match self.run_pipeline(&job).await {
            Ok(result_id) => {
                if let Err(e) = self.store.mark_succeeded(job_id, result_id).await {
                    error!(
                        job_id = %job_id,
                        error = %e,
                        "failed to record success; job stays in processing"
                    );
                    return;
                }
                info!(job_id = %job_id, result_id = %result_id, "job succeeded");

                // Post-commit side channel only - never affects job status.
                if let Err(e) = self
                    .kernel
                    .notifier
                    .result_persisted(job_id, job.source_id, result_id)
                    .await
                {
                    warn!(job_id = %job_id, error = %e, "result notification failed");
                }
            }
            Err(err) => {
                warn!(job_id = %job_id, attempt = job.attempts + 1, error = %err, "job attempt failed");
                match self
                    .store
                    .mark_failed(job_id, &err.to_string(), self.config.max_attempts)
                    .await
                {
                    Ok(JobStatus::Dead) => {
                        warn!(job_id = %job_id, "job dead-lettered after exhausting attempts")
                    }
                    Ok(_) => {}
                    Err(e) => error!(
                        job_id = %job_id,
                        error = %e,
                        "failed to record failure; job stays in processing"
                    ),
                }
            }
        }
    }

    /// The fallible portion: everything up to (but not including) the
    /// final status transition. Returns the persisted result's id.
    async fn run_pipeline(&self, job: &AnalysisJob) -> Result<Uuid, ExecuteError> {
        // 1. Resolve the segment address in the job's addressing scheme.
        let request = SegmentRequest {
            playback_ref: job.playback_ref.clone(),
            kind: job.source_kind,
            start: job.window_start,
            end: job.window_end,
        };

        // 2. Fetch + transcode. Failures here are not retried within the
        // attempt; the retry manager owns the timing.
        let segment = tokio::time::timeout(
            self.config.segment_timeout,
            self.kernel.transport.fetch_segment(&request),
        )
        .await
        .map_err(|_| ExecuteError::Transport(anyhow!("segment fetch timed out")))?
        .map_err(ExecuteError::Transport)?;

        // 3. Fan out to the analyzers. The detector only sees finished
        // sources, and runs concurrently with the primary analyzer; both
        // complete independently - neither cancels the other.
        let primary = tokio::time::timeout(
            self.config.analysis_timeout,
            self.kernel.analyzer.analyze(segment.clone()),
        );
        let secondary = async {
            match job.source_kind {
                SourceKind::Finished => Some(
                    tokio::time::timeout(
                        self.config.analysis_timeout,
                        self.kernel.detector.detect(segment.clone(), job.relative_start),
                    )
                    .await
                    .unwrap_or_else(|_| Err(anyhow!("object detection timed out"))),
                ),
                SourceKind::Live => None,
            }
        };
        let (primary, secondary) = tokio::join!(primary, secondary);

        let analysis = primary
            .unwrap_or_else(|_| Err(anyhow!("analysis timed out")))
            .map_err(ExecuteError::Analysis)?;

        // 4. Persist the result, then any detection batches. Detection
        // output is best-effort end to end: a detector error or a frame
        // write error is logged and the job still succeeds.
        let result = AnalysisResult::new(
            job.id,
            analysis.summary,
            analysis.tags,
            analysis.entities,
            analysis.events,
            Some(analysis.raw),
        );
        let result = result
            .insert(self.store.pool())
            .await
            .map_err(ExecuteError::Persistence)?;

        match secondary {
            Some(Ok(frames)) if !frames.is_empty() => {
                let rows: Vec<DetectionFrame> = frames
                    .into_iter()
                    .map(|f| DetectionFrame::new(job.id, f.timestamp, f.detections))
                    .collect();
                match DetectionFrame::insert_batch(&rows, self.store.pool()).await {
                    Ok(written) => {
                        info!(job_id = %job.id, frames = written, "stored detection frames")
                    }
                    Err(e) => {
                        warn!(job_id = %job.id, error = %e, "failed to store detection frames")
                    }
                }
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(job_id = %job.id, error = %e, "object detection failed, continuing without it")
            }
            None => {}
        }

        Ok(result.id)
    }
}
