//! Edit rendering: stitch, warp/decode, paste back, encode.

use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use ndarray::Array2;

use visage_core::bundle::FeatureBundle;
use visage_core::errors::VisageError;
use visage_pipeline::PortraitPipeline;

use crate::pipeline_error;
use crate::pool::ComputePool;

/// Output quality for the interactive stream; latency beats fidelity here.
const JPEG_QUALITY: u8 = 85;

/// Turns (bundle, edited keypoints) into an encoded frame. Every delegated
/// stage runs inside one compute-pool slot, off the transport runtime.
pub struct Compositor {
    pipeline: Arc<dyn PortraitPipeline>,
    pool: Arc<ComputePool>,
}

impl Compositor {
    pub fn new(pipeline: Arc<dyn PortraitPipeline>, pool: Arc<ComputePool>) -> Self {
        Self { pipeline, pool }
    }

    /// Render edited keypoints against a cached bundle into JPEG bytes.
    pub async fn render(
        &self,
        bundle: Arc<FeatureBundle>,
        edited: Array2<f32>,
    ) -> Result<Vec<u8>, VisageError> {
        let pipeline = Arc::clone(&self.pipeline);
        self.pool
            .run(move || render_blocking(pipeline.as_ref(), &bundle, &edited))
            .await
    }
}

fn render_blocking(
    pipeline: &dyn PortraitPipeline,
    bundle: &FeatureBundle,
    edited: &Array2<f32>,
) -> Result<Vec<u8>, VisageError> {
    let features = &bundle.features;

    let stitched = pipeline
        .stitch(&features.pose_keypoints, edited, &features.appearance)
        .map_err(pipeline_error)?;
    let rendered = pipeline
        .warp_decode(&features.appearance, &features.pose_keypoints, &stitched)
        .map_err(pipeline_error)?;

    let (width, height) = features.original_image.dimensions();
    let mask = pipeline
        .prepare_paste_back(&features.crop_to_original, width, height)
        .map_err(pipeline_error)?;
    let full = pipeline
        .paste_back(&rendered, &features.crop_to_original, &features.original_image, &mask)
        .map_err(pipeline_error)?;

    encode_jpeg(&full)
}

/// Encode at the fixed interactive quality.
fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, VisageError> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| VisageError::Encoding(e.to_string()))?;
    Ok(buffer)
}
