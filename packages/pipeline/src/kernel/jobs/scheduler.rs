//! Segment scheduler.
//!
//! Periodic scan that turns eligible video sources into queued analysis
//! jobs, one per complete window:
//!
//! ```text
//! Scheduler (every SCHEDULER_INTERVAL)
//!     │
//!     └─► Source::find_schedulable()
//!             └─► For each source:
//!                     ├─► live?      re-fetch duration from the registry
//!                     ├─► window calculator
//!                     ├─► JobStore::enqueue_windows (upsert, conflicts ignored)
//!                     └─► finished?  mark analysis_complete
//! ```
//!
//! A failure scheduling one source never aborts the scan of the others.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::store::JobStore;
use super::windows::windows_for_source;
use super::SourceKind;
use crate::kernel::PipelineKernel;
use crate::models::Source;

/// Configuration for the segment scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Scan period
    pub interval: Duration,
    /// Window length for finished sources, in seconds
    pub window_size_secs: i64,
    /// Window length for live sources, in seconds. Shorter, so analysis
    /// lags the feed by less.
    pub live_window_size_secs: i64,
}

/// Outcome of one scan cycle.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub sources_seen: usize,
    pub jobs_created: usize,
    pub sources_failed: usize,
}

/// Periodic service that schedules analysis windows for eligible sources.
pub struct SegmentScheduler {
    kernel: Arc<PipelineKernel>,
    store: JobStore,
    config: SchedulerConfig,
}

impl SegmentScheduler {
    pub fn new(kernel: Arc<PipelineKernel>, store: JobStore, config: SchedulerConfig) -> Self {
        Self {
            kernel,
            store,
            config,
        }
    }

    /// Run until the shutdown token fires.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "segment scheduler starting"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }

            match self.run_scan().await {
                Ok(outcome) => {
                    if outcome.jobs_created > 0 || outcome.sources_failed > 0 {
                        info!(
                            sources = outcome.sources_seen,
                            created = outcome.jobs_created,
                            failed = outcome.sources_failed,
                            "scheduler scan complete"
                        );
                    }
                }
                Err(e) => error!(error = %e, "scheduler scan failed"),
            }
        }

        info!("segment scheduler stopped");
    }

    /// One scan cycle over all schedulable sources. Per-source failures
    /// are isolated: logged, counted, and skipped.
    pub async fn run_scan(&self) -> Result<ScanOutcome> {
        let sources = Source::find_schedulable(&self.kernel.db_pool).await?;
        let mut outcome = ScanOutcome {
            sources_seen: sources.len(),
            ..Default::default()
        };

        for source in sources {
            match self.schedule_source(&source).await {
                Ok(created) => outcome.jobs_created += created,
                Err(e) => {
                    outcome.sources_failed += 1;
                    error!(source_id = %source.id, error = %e, "failed to schedule source");
                }
            }
        }

        Ok(outcome)
    }

    /// Schedule every complete window of one source, then mark finished
    /// sources fully scheduled.
    async fn schedule_source(&self, source: &Source) -> Result<usize> {
        let playback_ref = match &source.playback_ref {
            Some(r) => r.clone(),
            None => self.kernel.registry.playback_ref(source.id).await?,
        };

        let duration = self.current_duration(source, &playback_ref).await;
        let (kind, window_secs) = if source.is_live {
            (SourceKind::Live, self.config.live_window_size_secs)
        } else {
            (SourceKind::Finished, self.config.window_size_secs)
        };

        let windows =
            windows_for_source(duration, source.is_live, window_secs, source.start_epoch());
        let created = self
            .store
            .enqueue_windows(source, &playback_ref, kind, &windows)
            .await?;

        // Once the source stops being live there will never be another
        // complete window, so close it out now - even if this very cycle
        // enqueued windows, and even if no window ever fit. A trailing
        // partial window is dropped, which is documented behavior.
        if !source.is_live {
            Source::mark_analysis_complete(source.id, &self.kernel.db_pool).await?;
            debug!(source_id = %source.id, "source fully scheduled");
        }

        Ok(created)
    }

    /// Duration to window over. Live sources are asked from the registry
    /// because the cached row is stale while content still arrives; a
    /// registry hiccup falls back to the cache rather than stalling the
    /// whole scan.
    async fn current_duration(&self, source: &Source, playback_ref: &str) -> i64 {
        if !source.is_live {
            return source.duration_seconds.unwrap_or(0);
        }

        match self.kernel.registry.source_duration(playback_ref).await {
            Ok(duration) => duration,
            Err(e) => {
                warn!(
                    source_id = %source.id,
                    error = %e,
                    "live duration lookup failed, using cached value"
                );
                source.duration_seconds.unwrap_or(0)
            }
        }
    }
}
