//! Kernel: infrastructure and external-service seams.
//!
//! Everything the pipeline needs from the outside world enters through
//! the `Base*` traits here, so tests can swap every collaborator.

pub mod analyzer_client;
pub mod jobs;
pub mod notifier;
pub mod pipeline_kernel;
pub mod registry_client;
pub mod test_dependencies;
pub mod transport;
pub mod traits;

pub use analyzer_client::{DetectorClient, VisionAnalyzerClient};
pub use notifier::{NoopNotifier, WebhookNotifier};
pub use pipeline_kernel::PipelineKernel;
pub use registry_client::MediaRegistryClient;
pub use transport::FfmpegSegmentTransport;
pub use traits::{
    BaseObjectDetector, BaseResultNotifier, BaseSegmentTransport, BaseSourceRegistry,
    BaseVideoAnalyzer, FrameDetections, SegmentRequest, SemanticAnalysis,
};
