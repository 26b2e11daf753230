//! Integration tests for the job executor: the full per-job pipeline
//! against mock collaborators, covering success, partial success, the
//! failure taxonomy, and dead-lettering.

mod common;

use std::time::Duration;

use common::*;
use pipeline_core::common::Record;
use pipeline_core::kernel::jobs::{
    AnalysisJob, ExecutorConfig, JobExecutor, JobStatus, JobStore, SourceKind,
};
use pipeline_core::kernel::test_dependencies::TestDependencies;
use pipeline_core::kernel::FrameDetections;
use pipeline_core::models::{AnalysisResult, Detection, DetectionFrame};
use sqlx::PgPool;
use test_context::test_context;

fn executor_with(deps: &TestDependencies, pool: PgPool, max_attempts: i32) -> JobExecutor {
    let kernel = deps.build_kernel(pool.clone());
    JobExecutor::new(
        kernel,
        JobStore::new(pool),
        ExecutorConfig {
            max_attempts,
            segment_timeout: Duration::from_secs(5),
            analysis_timeout: Duration::from_secs(5),
        },
    )
}

fn sample_frames() -> Vec<FrameDetections> {
    vec![
        FrameDetections {
            timestamp: 61.0,
            detections: vec![Detection {
                label: "person".to_string(),
                confidence: 0.92,
                bbox: [0.1, 0.2, 0.3, 0.4],
            }],
        },
        FrameDetections {
            timestamp: 62.0,
            detections: vec![Detection {
                label: "forklift".to_string(),
                confidence: 0.81,
                bbox: [0.5, 0.5, 0.2, 0.3],
            }],
        },
    ]
}

/// A job the worker would have just claimed.
async fn processing_job(pool: &PgPool, kind: SourceKind, attempts: i32) -> AnalysisJob {
    let source = insert_ready_source(pool, kind == SourceKind::Live, Some(300)).await;
    let mut job = insert_job(pool, source.id, JobStatus::Processing, attempts, (60, 120), 0).await;
    if kind == SourceKind::Live {
        // Live jobs carry absolute program time in their window bounds.
        job.source_kind = SourceKind::Live;
        job.window_start = job.relative_start + source.start_epoch();
        job.window_end = job.relative_end + source.start_epoch();
        job = job.update(pool).await.unwrap();
    }
    job
}

#[test_context(TestHarness)]
#[tokio::test]
async fn successful_job_persists_result_and_detections(ctx: &mut TestHarness) {
    let deps = TestDependencies::new();
    deps.detector.set_frames(sample_frames());
    let executor = executor_with(&deps, ctx.db_pool.clone(), 3);

    let job = processing_job(&ctx.db_pool, SourceKind::Finished, 0).await;
    executor.execute(job.clone()).await;

    let done = reload_job(&ctx.db_pool, job.id).await;
    assert_eq!(done.status, JobStatus::Succeeded);
    assert!(done.last_error.is_none());

    let result = AnalysisResult::find_by_job(job.id, &ctx.db_pool)
        .await
        .unwrap()
        .expect("result row missing");
    assert_eq!(done.result_id, Some(result.id));
    assert!(!result.summary.is_empty());

    assert_eq!(DetectionFrame::count_for_job(job.id, &ctx.db_pool).await.unwrap(), 2);

    // The detector was offset by the window's source-relative start.
    assert_eq!(deps.detector.offsets_seen(), vec![60]);

    // Post-commit notification fired with the persisted ids.
    let notifications = deps.notifier.notifications();
    assert_eq!(notifications, vec![(job.id, job.source_id, result.id)]);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn secondary_failure_still_succeeds_without_detections(ctx: &mut TestHarness) {
    let deps = TestDependencies::new();
    deps.detector.set_failing(true);
    let executor = executor_with(&deps, ctx.db_pool.clone(), 3);

    let job = processing_job(&ctx.db_pool, SourceKind::Finished, 0).await;
    executor.execute(job.clone()).await;

    let done = reload_job(&ctx.db_pool, job.id).await;
    assert_eq!(done.status, JobStatus::Succeeded);
    assert!(AnalysisResult::find_by_job(job.id, &ctx.db_pool)
        .await
        .unwrap()
        .is_some());
    assert_eq!(DetectionFrame::count_for_job(job.id, &ctx.db_pool).await.unwrap(), 0);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn live_jobs_skip_object_detection(ctx: &mut TestHarness) {
    let deps = TestDependencies::new();
    let executor = executor_with(&deps, ctx.db_pool.clone(), 3);

    let job = processing_job(&ctx.db_pool, SourceKind::Live, 0).await;
    executor.execute(job.clone()).await;

    let done = reload_job(&ctx.db_pool, job.id).await;
    assert_eq!(done.status, JobStatus::Succeeded);
    assert!(deps.detector.offsets_seen().is_empty());
    assert_eq!(DetectionFrame::count_for_job(job.id, &ctx.db_pool).await.unwrap(), 0);

    // The transport was addressed in absolute program time.
    let requests = deps.transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].start, job.window_start);
    assert!(requests[0].start > job.relative_start);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn primary_failure_routes_to_failed(ctx: &mut TestHarness) {
    let deps = TestDependencies::new();
    deps.analyzer.set_failing(true);
    let executor = executor_with(&deps, ctx.db_pool.clone(), 3);

    let job = processing_job(&ctx.db_pool, SourceKind::Finished, 0).await;
    executor.execute(job.clone()).await;

    let done = reload_job(&ctx.db_pool, job.id).await;
    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(done.attempts, 1);
    let error = done.last_error.expect("expected an error message");
    assert!(error.contains("analysis failed"), "got: {error}");
    assert!(AnalysisResult::find_by_job(job.id, &ctx.db_pool)
        .await
        .unwrap()
        .is_none());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn transport_failure_routes_to_failed(ctx: &mut TestHarness) {
    let deps = TestDependencies::new();
    deps.transport.set_failing(true);
    let executor = executor_with(&deps, ctx.db_pool.clone(), 3);

    let job = processing_job(&ctx.db_pool, SourceKind::Finished, 0).await;
    executor.execute(job.clone()).await;

    let done = reload_job(&ctx.db_pool, job.id).await;
    assert_eq!(done.status, JobStatus::Failed);
    let error = done.last_error.expect("expected an error message");
    assert!(error.contains("segment fetch failed"), "got: {error}");

    // Neither analyzer ran: no segment, nothing to analyze.
    assert_eq!(deps.analyzer.call_count(), 0);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn final_failed_attempt_dead_letters_the_job(ctx: &mut TestHarness) {
    let deps = TestDependencies::new();
    deps.analyzer.set_failing(true);
    let executor = executor_with(&deps, ctx.db_pool.clone(), 3);

    // Two attempts already burned; this failure is the third and last.
    let job = processing_job(&ctx.db_pool, SourceKind::Finished, 2).await;
    executor.execute(job.clone()).await;

    let done = reload_job(&ctx.db_pool, job.id).await;
    assert_eq!(done.status, JobStatus::Dead);
    assert_eq!(done.attempts, 3);
    assert!(done.last_error.is_some());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn notifier_failure_never_affects_job_status(ctx: &mut TestHarness) {
    let deps = TestDependencies::new();
    deps.notifier.set_failing(true);
    let executor = executor_with(&deps, ctx.db_pool.clone(), 3);

    let job = processing_job(&ctx.db_pool, SourceKind::Finished, 0).await;
    executor.execute(job.clone()).await;

    assert_eq!(
        reload_job(&ctx.db_pool, job.id).await.status,
        JobStatus::Succeeded
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn detection_frame_upserts_are_idempotent(ctx: &mut TestHarness) {
    let source = insert_ready_source(&ctx.db_pool, false, Some(300)).await;
    let job = insert_job(&ctx.db_pool, source.id, JobStatus::Processing, 0, (0, 60), 0).await;

    let rows: Vec<DetectionFrame> = sample_frames()
        .into_iter()
        .map(|f| DetectionFrame::new(job.id, f.timestamp, f.detections))
        .collect();

    let first = DetectionFrame::insert_batch(&rows, &ctx.db_pool).await.unwrap();
    assert_eq!(first, 2);

    // Same (job, frame) keys again: silently ignored.
    let again: Vec<DetectionFrame> = sample_frames()
        .into_iter()
        .map(|f| DetectionFrame::new(job.id, f.timestamp, f.detections))
        .collect();
    let second = DetectionFrame::insert_batch(&again, &ctx.db_pool).await.unwrap();
    assert_eq!(second, 0);
    assert_eq!(DetectionFrame::count_for_job(job.id, &ctx.db_pool).await.unwrap(), 2);
}
