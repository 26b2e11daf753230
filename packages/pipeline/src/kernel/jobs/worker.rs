//! Worker pool for claimed job execution.
//!
//! A fixed number of concurrent execution slots, sized by downstream
//! analyzer rate limits rather than CPU. Each tick tops the slot set off
//! by claiming queued jobs; a slot is only freed when its job's execution
//! finishes, so slow analysis calls throttle new claims through
//! backpressure instead of queueing unboundedly in memory.
//!
//! The in-process slot set bounds only this process. Exclusivity across
//! worker processes comes entirely from the store's conditional-update
//! claim.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::executor::JobExecutor;
use super::store::JobStore;

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Concurrent execution slots
    pub max_concurrent_jobs: usize,
    /// How long to sleep between claim rounds
    pub poll_interval: Duration,
    /// Worker ID for this instance (log correlation only)
    pub worker_id: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            poll_interval: Duration::from_secs(5),
            worker_id: format!("worker-{}", Uuid::new_v4()),
        }
    }
}

/// Continuous claim loop feeding a bounded set of in-flight executions.
pub struct WorkerPool {
    store: JobStore,
    executor: Arc<JobExecutor>,
    config: WorkerPoolConfig,
}

impl WorkerPool {
    pub fn new(store: JobStore, executor: Arc<JobExecutor>, config: WorkerPoolConfig) -> Self {
        Self {
            store,
            executor,
            config,
        }
    }

    /// Run until the shutdown token fires, then drain in-flight jobs.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            worker_id = %self.config.worker_id,
            slots = self.config.max_concurrent_jobs,
            "worker pool starting"
        );

        let mut in_flight: JoinSet<()> = JoinSet::new();

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            // Reap finished executions so their slots free up.
            while in_flight.try_join_next().is_some() {}

            // Top off the slot set while capacity remains and claims land.
            while in_flight.len() < self.config.max_concurrent_jobs {
                match self.store.claim_next().await {
                    Ok(Some(job)) => {
                        debug!(
                            worker_id = %self.config.worker_id,
                            job_id = %job.id,
                            in_flight = in_flight.len() + 1,
                            "claimed job"
                        );
                        let executor = Arc::clone(&self.executor);
                        in_flight.spawn(async move {
                            executor.execute(job).await;
                        });
                    }
                    // Queue empty (or a race lost): nothing more this tick.
                    Ok(None) => break,
                    Err(e) => {
                        error!(error = %e, "claim failed");
                        break;
                    }
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        // Let in-flight executions finish; each resolves its own job
        // status, so interrupting them would only strand Processing rows.
        if !in_flight.is_empty() {
            info!(
                worker_id = %self.config.worker_id,
                count = in_flight.len(),
                "waiting for in-flight jobs to complete"
            );
            while in_flight.join_next().await.is_some() {}
        }

        info!(worker_id = %self.config.worker_id, "worker pool stopped");
    }
}
