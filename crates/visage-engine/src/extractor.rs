//! One-time feature extraction for an uploaded image.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};

use visage_core::bundle::FaceFeatures;
use visage_core::errors::VisageError;
use visage_core::geometry::BoundingBox;
use visage_core::keypoints::apply_pose;
use visage_pipeline::PortraitPipeline;
use visage_store::BundleSource;

use crate::pipeline_error;
use crate::pool::ComputePool;

/// Limits applied to the decoded source image before detection.
#[derive(Clone, Debug)]
pub struct ExtractorConfig {
    /// Neither output dimension exceeds this.
    pub max_dimension: u32,
    /// Output dimensions are truncated to a multiple of this; the downstream
    /// networks want even shapes.
    pub shape_granularity: u32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_dimension: 1280,
            shape_granularity: 2,
        }
    }
}

/// Sequences the per-image pipeline stages: decode, normalize, detect, crop,
/// encode, and geometry. The whole call runs on the compute pool; a failure
/// at any stage aborts the extraction with nothing stored.
pub struct FeatureExtractor {
    pipeline: Arc<dyn PortraitPipeline>,
    pool: Arc<ComputePool>,
    config: ExtractorConfig,
}

impl FeatureExtractor {
    pub fn new(
        pipeline: Arc<dyn PortraitPipeline>,
        pool: Arc<ComputePool>,
        config: ExtractorConfig,
    ) -> Self {
        Self {
            pipeline,
            pool,
            config,
        }
    }

    fn extract_blocking(
        pipeline: &dyn PortraitPipeline,
        config: &ExtractorConfig,
        bytes: &[u8],
    ) -> Result<FaceFeatures, VisageError> {
        let image = decode_oriented(bytes)?;
        let image = resize_to_limit(image, config.max_dimension, config.shape_granularity);

        let face = pipeline.detect_and_align(&image).map_err(pipeline_error)?;
        if face.candidates > 1 {
            tracing::info!(
                candidates = face.candidates,
                "multiple faces detected, keeping the largest"
            );
        }

        let encoding = pipeline.encode(&face.crop).map_err(pipeline_error)?;
        let pose_keypoints = apply_pose(
            &encoding.keypoints.keypoints,
            &encoding.keypoints.pose,
            0.0,
            0.0,
            0.0,
        );
        let bounding_box = BoundingBox::from_landmarks(&face.landmarks);

        Ok(FaceFeatures {
            baseline: encoding.keypoints,
            pose_keypoints,
            appearance: encoding.appearance,
            crop_to_original: face.crop_to_original,
            original_image: image,
            bounding_box,
        })
    }
}

#[async_trait]
impl BundleSource for FeatureExtractor {
    async fn extract(&self, bytes: Bytes) -> Result<FaceFeatures, VisageError> {
        let pipeline = Arc::clone(&self.pipeline);
        let config = self.config.clone();
        self.pool
            .run(move || Self::extract_blocking(pipeline.as_ref(), &config, &bytes))
            .await
    }
}

/// Decode raw bytes into RGB8, honouring EXIF orientation.
fn decode_oriented(bytes: &[u8]) -> Result<RgbImage, VisageError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| VisageError::MalformedRequest(format!("unreadable image payload: {e}")))?;
    let mut decoder = reader
        .into_decoder()
        .map_err(|e| VisageError::MalformedRequest(format!("failed to decode image: {e}")))?;
    let orientation = decoder
        .orientation()
        .map_err(|e| VisageError::MalformedRequest(format!("failed to read orientation: {e}")))?;
    let mut image = DynamicImage::from_decoder(decoder)
        .map_err(|e| VisageError::MalformedRequest(format!("failed to decode image: {e}")))?;
    image.apply_orientation(orientation);
    Ok(image.to_rgb8())
}

/// Shrink so neither dimension exceeds `max_dim`, then truncate both to a
/// multiple of `granularity`.
fn resize_to_limit(image: RgbImage, max_dim: u32, granularity: u32) -> RgbImage {
    let mut image = image;
    let (w, h) = image.dimensions();
    if w.max(h) > max_dim {
        let scale = max_dim as f64 / w.max(h) as f64;
        let nw = ((w as f64 * scale) as u32).max(1);
        let nh = ((h as f64 * scale) as u32).max(1);
        image = image::imageops::resize(&image, nw, nh, image::imageops::FilterType::Lanczos3);
    }

    let g = granularity.max(1);
    let (w, h) = image.dimensions();
    let (tw, th) = (w - w % g, h - h % g);
    if (tw, th) != (w, h) && tw > 0 && th > 0 {
        image = image::imageops::crop_imm(&image, 0, 0, tw, th).to_image();
    }
    image
}
