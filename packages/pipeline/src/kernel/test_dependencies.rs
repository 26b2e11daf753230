// TestDependencies - mock implementations for testing
//
// Provides mock services that can be injected into PipelineKernel for
// tests: scripted responses, recorded calls, switchable failure modes.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use sqlx::PgPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::{
    BaseObjectDetector, BaseResultNotifier, BaseSegmentTransport, BaseSourceRegistry,
    BaseVideoAnalyzer, FrameDetections, PipelineKernel, SegmentRequest, SemanticAnalysis,
};

// =============================================================================
// Mock Source Registry
// =============================================================================

pub struct MockSourceRegistry {
    duration: Arc<Mutex<i64>>,
    fail: Arc<AtomicBool>,
    duration_calls: Arc<Mutex<Vec<String>>>,
}

impl MockSourceRegistry {
    pub fn new() -> Self {
        Self {
            duration: Arc::new(Mutex::new(0)),
            fail: Arc::new(AtomicBool::new(false)),
            duration_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_duration(self, secs: i64) -> Self {
        *self.duration.lock().unwrap() = secs;
        self
    }

    /// Script the duration the registry reports from now on.
    pub fn set_duration(&self, secs: i64) {
        *self.duration.lock().unwrap() = secs;
    }

    /// Make every registry call fail until further notice.
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub fn duration_calls(&self) -> Vec<String> {
        self.duration_calls.lock().unwrap().clone()
    }
}

impl Default for MockSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseSourceRegistry for MockSourceRegistry {
    async fn source_duration(&self, playback_ref: &str) -> Result<i64> {
        self.duration_calls
            .lock()
            .unwrap()
            .push(playback_ref.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("registry unavailable"));
        }
        Ok(*self.duration.lock().unwrap())
    }

    async fn playback_ref(&self, source_id: Uuid) -> Result<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("registry unavailable"));
        }
        Ok(format!("https://play.test/{}", source_id))
    }
}

// =============================================================================
// Mock Segment Transport
// =============================================================================

pub struct MockSegmentTransport {
    payload: Arc<Mutex<Bytes>>,
    fail: Arc<AtomicBool>,
    requests: Arc<Mutex<Vec<SegmentRequest>>>,
}

impl MockSegmentTransport {
    pub fn new() -> Self {
        Self {
            payload: Arc::new(Mutex::new(Bytes::from_static(b"segment-bytes"))),
            fail: Arc::new(AtomicBool::new(false)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    /// Every request the transport has seen, in order.
    pub fn requests(&self) -> Vec<SegmentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockSegmentTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseSegmentTransport for MockSegmentTransport {
    async fn fetch_segment(&self, request: &SegmentRequest) -> Result<Bytes> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("segment transport failed"));
        }
        Ok(self.payload.lock().unwrap().clone())
    }
}

// =============================================================================
// Mock Analyzers
// =============================================================================

pub struct MockVideoAnalyzer {
    summary: Arc<Mutex<String>>,
    fail: Arc<AtomicBool>,
    calls: Arc<Mutex<usize>>,
}

impl MockVideoAnalyzer {
    pub fn new() -> Self {
        Self {
            summary: Arc::new(Mutex::new("two people near the loading dock".to_string())),
            fail: Arc::new(AtomicBool::new(false)),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_summary(self, summary: &str) -> Self {
        *self.summary.lock().unwrap() = summary.to_string();
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl Default for MockVideoAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseVideoAnalyzer for MockVideoAnalyzer {
    async fn analyze(&self, _segment: Bytes) -> Result<SemanticAnalysis> {
        *self.calls.lock().unwrap() += 1;
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("vision analyzer failed"));
        }
        let summary = self.summary.lock().unwrap().clone();
        Ok(SemanticAnalysis {
            summary: summary.clone(),
            tags: vec!["person".to_string(), "outdoor".to_string()],
            entities: vec!["loading dock".to_string()],
            events: vec!["movement".to_string()],
            raw: serde_json::json!({ "summary": summary }),
        })
    }
}

pub struct MockObjectDetector {
    frames: Arc<Mutex<Vec<FrameDetections>>>,
    fail: Arc<AtomicBool>,
    calls: Arc<Mutex<Vec<i64>>>,
}

impl MockObjectDetector {
    pub fn new() -> Self {
        Self {
            frames: Arc::new(Mutex::new(Vec::new())),
            fail: Arc::new(AtomicBool::new(false)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_frames(self, frames: Vec<FrameDetections>) -> Self {
        *self.frames.lock().unwrap() = frames;
        self
    }

    /// Script the frames the detector returns from now on.
    pub fn set_frames(&self, frames: Vec<FrameDetections>) {
        *self.frames.lock().unwrap() = frames;
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    /// The offsets the detector was invoked with, in order.
    pub fn offsets_seen(&self) -> Vec<i64> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockObjectDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseObjectDetector for MockObjectDetector {
    async fn detect(&self, _segment: Bytes, offset_secs: i64) -> Result<Vec<FrameDetections>> {
        self.calls.lock().unwrap().push(offset_secs);
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("object detector failed"));
        }
        Ok(self.frames.lock().unwrap().clone())
    }
}

// =============================================================================
// Mock Result Notifier
// =============================================================================

pub struct MockResultNotifier {
    fail: Arc<AtomicBool>,
    notifications: Arc<Mutex<Vec<(Uuid, Uuid, Uuid)>>>,
}

impl MockResultNotifier {
    pub fn new() -> Self {
        Self {
            fail: Arc::new(AtomicBool::new(false)),
            notifications: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub fn notifications(&self) -> Vec<(Uuid, Uuid, Uuid)> {
        self.notifications.lock().unwrap().clone()
    }
}

impl Default for MockResultNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseResultNotifier for MockResultNotifier {
    async fn result_persisted(
        &self,
        job_id: Uuid,
        source_id: Uuid,
        result_id: Uuid,
    ) -> Result<()> {
        self.notifications
            .lock()
            .unwrap()
            .push((job_id, source_id, result_id));
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("notifier unavailable"));
        }
        Ok(())
    }
}

// =============================================================================
// Bundle
// =============================================================================

/// All mocks plus a kernel wired to them. Tests keep the concrete handles
/// for scripting and assertions while the pipeline sees only the traits.
pub struct TestDependencies {
    pub registry: Arc<MockSourceRegistry>,
    pub transport: Arc<MockSegmentTransport>,
    pub analyzer: Arc<MockVideoAnalyzer>,
    pub detector: Arc<MockObjectDetector>,
    pub notifier: Arc<MockResultNotifier>,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(MockSourceRegistry::new()),
            transport: Arc::new(MockSegmentTransport::new()),
            analyzer: Arc::new(MockVideoAnalyzer::new()),
            detector: Arc::new(MockObjectDetector::new()),
            notifier: Arc::new(MockResultNotifier::new()),
        }
    }

    pub fn build_kernel(&self, db_pool: PgPool) -> Arc<PipelineKernel> {
        Arc::new(PipelineKernel::new(
            db_pool,
            Arc::clone(&self.registry) as Arc<dyn BaseSourceRegistry>,
            Arc::clone(&self.transport) as Arc<dyn BaseSegmentTransport>,
            Arc::clone(&self.analyzer) as Arc<dyn BaseVideoAnalyzer>,
            Arc::clone(&self.detector) as Arc<dyn BaseObjectDetector>,
            Arc::clone(&self.notifier) as Arc<dyn BaseResultNotifier>,
        ))
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
