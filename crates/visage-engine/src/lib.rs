//! Edit/render engine: the pure keypoint edit algebra, the one-time feature
//! extractor, the compositor that turns edited keypoints into encoded frames,
//! and the bounded pool that keeps heavy pipeline work off the transport
//! runtime.

pub mod compositor;
pub mod editor;
pub mod expressions;
pub mod extractor;
pub mod pool;

pub use compositor::Compositor;
pub use extractor::{ExtractorConfig, FeatureExtractor};
pub use pool::ComputePool;

use visage_core::errors::VisageError;
use visage_pipeline::PipelineError;

pub(crate) fn pipeline_error(err: PipelineError) -> VisageError {
    match err {
        PipelineError::NoFace => VisageError::NoFaceDetected,
        PipelineError::Inference(detail) => VisageError::ModelInference(detail),
    }
}
