// PipelineKernel - core infrastructure with all dependencies
//
// The PipelineKernel holds all pipeline dependencies (database, external
// services) and provides access via traits for testability.

use sqlx::PgPool;
use std::sync::Arc;

use super::{
    BaseObjectDetector, BaseResultNotifier, BaseSegmentTransport, BaseSourceRegistry,
    BaseVideoAnalyzer,
};

/// PipelineKernel holds all pipeline dependencies
pub struct PipelineKernel {
    pub db_pool: PgPool,
    pub registry: Arc<dyn BaseSourceRegistry>,
    pub transport: Arc<dyn BaseSegmentTransport>,
    pub analyzer: Arc<dyn BaseVideoAnalyzer>,
    pub detector: Arc<dyn BaseObjectDetector>,
    pub notifier: Arc<dyn BaseResultNotifier>,
}

impl PipelineKernel {
    /// Creates a new PipelineKernel with the given dependencies
    pub fn new(
        db_pool: PgPool,
        registry: Arc<dyn BaseSourceRegistry>,
        transport: Arc<dyn BaseSegmentTransport>,
        analyzer: Arc<dyn BaseVideoAnalyzer>,
        detector: Arc<dyn BaseObjectDetector>,
        notifier: Arc<dyn BaseResultNotifier>,
    ) -> Self {
        Self {
            db_pool,
            registry,
            transport,
            analyzer,
            detector,
            notifier,
        }
    }
}
