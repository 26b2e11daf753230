//! Retry and dead-letter management.
//!
//! Failed jobs below the attempt cap are returned to the queue once their
//! exponential backoff has elapsed. Jobs at the cap were already routed
//! straight to Dead by the executor's failure path, so this sweep never
//! touches them. The same cycle also reclaims Processing rows abandoned
//! by a crashed worker.

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::store::JobStore;

/// Longest backoff between retries regardless of attempt count.
const MAX_BACKOFF: Duration = Duration::from_secs(3600);

/// Configuration for the retry manager.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Sweep period
    pub interval: Duration,
    /// Attempt cap (must match the executor's)
    pub max_attempts: i32,
    /// Base unit for exponential backoff
    pub backoff_base: Duration,
    /// Age after which a Processing row counts as abandoned
    pub processing_timeout: Duration,
}

/// Outcome of one sweep cycle.
#[derive(Debug, Default)]
pub struct SweepOutcome {
    pub candidates: usize,
    pub requeued: usize,
    pub reclaimed: u64,
}

/// Backoff before attempt `attempts + 1`: `base * 2^attempts`, capped.
pub fn backoff_for(base: Duration, attempts: i32) -> Duration {
    let factor = 2u32.saturating_pow(attempts.max(0) as u32);
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

/// Periodic service that rehabilitates failed jobs.
pub struct RetryManager {
    store: JobStore,
    config: RetryConfig,
}

impl RetryManager {
    pub fn new(store: JobStore, config: RetryConfig) -> Self {
        Self { store, config }
    }

    /// Run until the shutdown token fires.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "retry manager starting"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }

            match self.run_sweep().await {
                Ok(outcome) => {
                    if outcome.requeued > 0 || outcome.reclaimed > 0 {
                        info!(
                            requeued = outcome.requeued,
                            reclaimed = outcome.reclaimed,
                            "retry sweep complete"
                        );
                    }
                }
                Err(e) => error!(error = %e, "retry sweep failed"),
            }
        }

        info!("retry manager stopped");
    }

    /// One sweep: requeue failed jobs whose backoff has elapsed, then
    /// reclaim abandoned Processing rows. Per-candidate failures are
    /// isolated.
    pub async fn run_sweep(&self) -> Result<SweepOutcome> {
        let candidates = self
            .store
            .find_retry_candidates(self.config.max_attempts)
            .await?;

        let mut outcome = SweepOutcome {
            candidates: candidates.len(),
            ..Default::default()
        };
        let now = Utc::now();

        for job in candidates {
            let backoff = backoff_for(self.config.backoff_base, job.attempts);
            let elapsed = (now - job.updated_at)
                .to_std()
                .unwrap_or(Duration::ZERO);

            if elapsed < backoff {
                continue;
            }

            match self.store.requeue(job.id).await {
                Ok(true) => {
                    outcome.requeued += 1;
                    debug!(
                        job_id = %job.id,
                        attempts = job.attempts,
                        backoff_secs = backoff.as_secs(),
                        "requeued failed job"
                    );
                }
                // Someone else moved it since the candidate query; fine.
                Ok(false) => {}
                Err(e) => error!(job_id = %job.id, error = %e, "failed to requeue job"),
            }
        }

        outcome.reclaimed = self
            .store
            .reclaim_stale_processing(self.config.processing_timeout.as_secs() as i64)
            .await?;

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let base = Duration::from_secs(10);
        assert_eq!(backoff_for(base, 0), Duration::from_secs(10));
        assert_eq!(backoff_for(base, 1), Duration::from_secs(20));
        assert_eq!(backoff_for(base, 2), Duration::from_secs(40));
        assert_eq!(backoff_for(base, 3), Duration::from_secs(80));
    }

    #[test]
    fn backoff_is_capped() {
        let base = Duration::from_secs(10);
        assert_eq!(backoff_for(base, 30), MAX_BACKOFF);
    }

    #[test]
    fn negative_attempts_clamp_to_base() {
        let base = Duration::from_secs(10);
        assert_eq!(backoff_for(base, -1), base);
    }
}
