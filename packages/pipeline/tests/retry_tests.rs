//! Integration tests for the retry manager: backoff timing, dead-letter
//! finality, and reclaim of abandoned Processing rows.

mod common;

use std::time::Duration;

use common::*;
use pipeline_core::kernel::jobs::{JobStatus, JobStore, RetryConfig, RetryManager};
use sqlx::PgPool;
use test_context::test_context;

fn manager(pool: PgPool) -> RetryManager {
    RetryManager::new(
        JobStore::new(pool),
        RetryConfig {
            interval: Duration::from_secs(30),
            max_attempts: 3,
            backoff_base: Duration::from_secs(10),
            processing_timeout: Duration::from_secs(900),
        },
    )
}

#[test_context(TestHarness)]
#[tokio::test]
async fn failed_job_requeues_once_backoff_elapses(ctx: &mut TestHarness) {
    let manager = manager(ctx.db_pool.clone());
    let source = insert_ready_source(&ctx.db_pool, false, Some(60)).await;

    // attempts = 1 -> backoff 20s; the failure is 25s old.
    let job = insert_job(&ctx.db_pool, source.id, JobStatus::Failed, 1, (0, 60), 25).await;

    let outcome = manager.run_sweep().await.expect("sweep failed");
    assert_eq!(outcome.requeued, 1);

    let requeued = reload_job(&ctx.db_pool, job.id).await;
    assert_eq!(requeued.status, JobStatus::Queued);
    // Diagnostics survive the requeue until the next failure overwrites them.
    assert_eq!(requeued.attempts, 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn failed_job_waits_out_its_backoff(ctx: &mut TestHarness) {
    let manager = manager(ctx.db_pool.clone());
    let source = insert_ready_source(&ctx.db_pool, false, Some(60)).await;

    // attempts = 2 -> backoff 40s; the failure is only 25s old.
    let job = insert_job(&ctx.db_pool, source.id, JobStatus::Failed, 2, (0, 60), 25).await;

    let outcome = manager.run_sweep().await.expect("sweep failed");
    assert_eq!(outcome.requeued, 0);
    assert_eq!(
        reload_job(&ctx.db_pool, job.id).await.status,
        JobStatus::Failed
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn dead_jobs_are_never_requeued(ctx: &mut TestHarness) {
    let manager = manager(ctx.db_pool.clone());
    let source = insert_ready_source(&ctx.db_pool, false, Some(60)).await;

    // Ancient dead job: no amount of elapsed time matters.
    let job = insert_job(&ctx.db_pool, source.id, JobStatus::Dead, 3, (0, 60), 86_400).await;

    let outcome = manager.run_sweep().await.expect("sweep failed");
    assert_eq!(outcome.candidates, 0);
    assert_eq!(outcome.requeued, 0);
    assert_eq!(reload_job(&ctx.db_pool, job.id).await.status, JobStatus::Dead);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn succeeded_jobs_are_left_alone(ctx: &mut TestHarness) {
    let manager = manager(ctx.db_pool.clone());
    let source = insert_ready_source(&ctx.db_pool, false, Some(60)).await;
    let job = insert_job(&ctx.db_pool, source.id, JobStatus::Succeeded, 1, (0, 60), 3_600).await;

    manager.run_sweep().await.expect("sweep failed");
    assert_eq!(
        reload_job(&ctx.db_pool, job.id).await.status,
        JobStatus::Succeeded
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn abandoned_processing_jobs_are_reclaimed(ctx: &mut TestHarness) {
    let manager = manager(ctx.db_pool.clone());
    let source = insert_ready_source(&ctx.db_pool, false, Some(120)).await;

    // Stuck for two hours: its worker is gone. Reclaim without charging
    // an attempt - the job never observably failed.
    let stuck = insert_job(&ctx.db_pool, source.id, JobStatus::Processing, 1, (0, 60), 7_200).await;
    // Fresh claim on another worker: must be left alone.
    let active = insert_job(&ctx.db_pool, source.id, JobStatus::Processing, 0, (60, 120), 10).await;

    let outcome = manager.run_sweep().await.expect("sweep failed");
    assert_eq!(outcome.reclaimed, 1);

    let reclaimed = reload_job(&ctx.db_pool, stuck.id).await;
    assert_eq!(reclaimed.status, JobStatus::Queued);
    assert_eq!(reclaimed.attempts, 1);
    assert_eq!(
        reload_job(&ctx.db_pool, active.id).await.status,
        JobStatus::Processing
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn requeued_job_is_claimable_again(ctx: &mut TestHarness) {
    let manager = manager(ctx.db_pool.clone());
    let store = JobStore::new(ctx.db_pool.clone());
    let source = insert_ready_source(&ctx.db_pool, false, Some(60)).await;

    let job = insert_job(&ctx.db_pool, source.id, JobStatus::Failed, 1, (0, 60), 60).await;
    manager.run_sweep().await.expect("sweep failed");

    let claimed = store.claim_next().await.unwrap().expect("expected a job");
    assert_eq!(claimed.id, job.id);
}
