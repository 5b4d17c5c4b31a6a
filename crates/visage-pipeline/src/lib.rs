//! Seam to the heavy face model stages.
//!
//! `PortraitPipeline` covers exactly the five model calls the render path
//! needs (detection/alignment, encoding, stitching, warp/decode, paste-back
//! with its mask). Implementations are synchronous and CPU/GPU-bound; callers
//! off-load them through the engine's compute pool. The asset/bootstrap layer
//! guarantees model weights exist before a backend is constructed — backends
//! do not retry or re-download.

pub mod synthetic;
mod types;

use image::{GrayImage, RgbImage};
use ndarray::Array2;
use visage_core::bundle::AppearanceFeature;
use visage_core::geometry::CropTransform;

pub use synthetic::SyntheticPipeline;
pub use types::{Encoding, FaceCrop, Landmarks, CROP_SIZE};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no face detected")]
    NoFace,

    #[error("inference failed: {0}")]
    Inference(String),
}

pub trait PortraitPipeline: Send + Sync {
    /// Detect the face — picking one by the largest-first rule when several
    /// are present — and return the aligned square crop with the transform
    /// back to original-image coordinates.
    fn detect_and_align(&self, image: &RgbImage) -> Result<FaceCrop, PipelineError>;

    /// Run the appearance and motion encoders on an aligned crop.
    fn encode(&self, crop: &RgbImage) -> Result<Encoding, PipelineError>;

    /// Reconcile linearly edited keypoints against the learned manifold.
    fn stitch(
        &self,
        pose_keypoints: &Array2<f32>,
        target: &Array2<f32>,
        appearance: &AppearanceFeature,
    ) -> Result<Array2<f32>, PipelineError>;

    /// Render a crop-space image for the stitched target keypoints.
    fn warp_decode(
        &self,
        appearance: &AppearanceFeature,
        pose_keypoints: &Array2<f32>,
        target: &Array2<f32>,
    ) -> Result<RgbImage, PipelineError>;

    /// Build the blend mask for pasting a rendered crop back into an
    /// original image of the given dimensions.
    fn prepare_paste_back(
        &self,
        crop_to_original: &CropTransform,
        width: u32,
        height: u32,
    ) -> Result<GrayImage, PipelineError>;

    /// Blend a rendered crop into the original image through the mask.
    fn paste_back(
        &self,
        rendered: &RgbImage,
        crop_to_original: &CropTransform,
        original: &RgbImage,
        mask: &GrayImage,
    ) -> Result<RgbImage, PipelineError>;
}
