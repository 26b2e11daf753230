// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (scheduling, claiming, retry policy) lives in kernel/jobs
// and uses these traits at the seams.
//
// Naming convention: Base* for trait names (e.g., BaseVideoAnalyzer)

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::kernel::jobs::SourceKind;
use crate::models::result::Detection;

// =============================================================================
// Source Registry (Infrastructure - playback metadata)
// =============================================================================

/// The external registry that knows each source's playback state.
///
/// Duration of a live source MUST come from here, not from the cached
/// `sources` row - the cached value goes stale while content is still
/// arriving.
#[async_trait]
pub trait BaseSourceRegistry: Send + Sync {
    /// Current duration of a source in seconds.
    async fn source_duration(&self, playback_ref: &str) -> Result<i64>;

    /// Resolve the stable playback handle for a source.
    async fn playback_ref(&self, source_id: Uuid) -> Result<String>;
}

// =============================================================================
// Segment Transport (Infrastructure - media bytes)
// =============================================================================

/// A request for the raw media bytes of one analysis window.
#[derive(Debug, Clone)]
pub struct SegmentRequest {
    pub playback_ref: String,
    pub kind: SourceKind,
    /// Addressing-scheme seconds: absolute program time for live sources,
    /// asset-relative time for finished ones.
    pub start: i64,
    pub end: i64,
}

/// Fetches and transcodes one segment. A black box from the pipeline's
/// perspective - it may succeed, time out, or fail.
#[async_trait]
pub trait BaseSegmentTransport: Send + Sync {
    async fn fetch_segment(&self, request: &SegmentRequest) -> Result<Bytes>;
}

// =============================================================================
// Analyzers (Infrastructure - AI services)
// =============================================================================

/// Output of the primary (semantic) analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticAnalysis {
    pub summary: String,
    pub tags: Vec<String>,
    pub entities: Vec<String>,
    pub events: Vec<String>,
    /// Raw analyzer payload, persisted verbatim for debugging.
    pub raw: serde_json::Value,
}

/// One frame's worth of detector output, timestamped in seconds relative
/// to the start of the analyzed segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameDetections {
    pub timestamp: f64,
    pub detections: Vec<Detection>,
}

/// Primary analyzer. Failure here is fatal to the job.
#[async_trait]
pub trait BaseVideoAnalyzer: Send + Sync {
    async fn analyze(&self, segment: Bytes) -> Result<SemanticAnalysis>;
}

/// Secondary (object-detection) analyzer. Failure here is tolerated.
///
/// `offset_secs` is the window's source-relative start, letting the
/// detector stamp frames in source time.
#[async_trait]
pub trait BaseObjectDetector: Send + Sync {
    async fn detect(&self, segment: Bytes, offset_secs: i64) -> Result<Vec<FrameDetections>>;
}

// =============================================================================
// Result Notifier (Infrastructure - post-commit side channel)
// =============================================================================

/// Best-effort notification after a result is persisted (e.g., to a search
/// indexer). Called only after the job's status transition committed;
/// errors are logged and swallowed, never reflected in job status.
#[async_trait]
pub trait BaseResultNotifier: Send + Sync {
    async fn result_persisted(&self, job_id: Uuid, source_id: Uuid, result_id: Uuid)
        -> Result<()>;
}
