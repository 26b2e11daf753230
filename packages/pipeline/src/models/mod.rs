pub mod result;
pub mod source;

pub use result::{AnalysisResult, Detection, DetectionFrame};
pub use source::Source;
