//! Deterministic CPU reference backend.
//!
//! Stands in for the neural stages during development and in tests: the face
//! gate is a luma-variance check, landmarks are synthesized on an ellipse,
//! the appearance feature is the crop itself, and warping is a rigid pixel
//! shift driven by the mean keypoint delta. Same input, same output — no
//! randomness anywhere. Real model backends implement `PortraitPipeline`
//! against actual weights.

use std::f32::consts::TAU;

use image::{imageops, GrayImage, RgbImage};
use ndarray::{Array2, ArrayD, IxDyn};

use visage_core::bundle::AppearanceFeature;
use visage_core::geometry::CropTransform;
use visage_core::keypoints::{KeypointInfo, Pose, NUM_KEYPOINTS};

use crate::types::{Encoding, FaceCrop, CROP_SIZE};
use crate::{PipelineError, PortraitPipeline};

/// Landmark count matching the dense 2D landmark models.
const NUM_LANDMARKS: usize = 106;

/// Pixels moved per unit of mean keypoint displacement.
const WARP_GAIN: f32 = 2000.0;

pub struct SyntheticPipeline {
    /// Minimum luma standard deviation for the face gate; a flat frame has
    /// nothing to detect.
    variance_floor: f32,
}

impl SyntheticPipeline {
    pub fn new() -> Self {
        Self { variance_floor: 4.0 }
    }
}

impl Default for SyntheticPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl PortraitPipeline for SyntheticPipeline {
    fn detect_and_align(&self, image: &RgbImage) -> Result<FaceCrop, PipelineError> {
        if luma_stddev(image) < self.variance_floor {
            return Err(PipelineError::NoFace);
        }

        let (w, h) = image.dimensions();
        let side = w.min(h);
        let x0 = (w - side) / 2;
        let y0 = (h - side) / 2;

        let crop = imageops::resize(
            &imageops::crop_imm(image, x0, y0, side, side).to_image(),
            CROP_SIZE,
            CROP_SIZE,
            imageops::FilterType::Lanczos3,
        );

        let scale = side as f32 / CROP_SIZE as f32;
        let crop_to_original = CropTransform::new(ndarray::array![
            [scale, 0.0, x0 as f32],
            [0.0, scale, y0 as f32],
        ]);

        // Landmarks on an ellipse around the frame center, in original-image
        // coordinates.
        let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
        let rx = side as f32 * 0.22;
        let ry = side as f32 * 0.30;
        let mut landmarks = Array2::zeros((NUM_LANDMARKS, 2));
        for i in 0..NUM_LANDMARKS {
            let theta = i as f32 / NUM_LANDMARKS as f32 * TAU;
            landmarks[[i, 0]] = cx + rx * theta.cos();
            landmarks[[i, 1]] = cy + ry * theta.sin();
        }

        Ok(FaceCrop {
            crop,
            landmarks,
            crop_to_original,
            candidates: 1,
        })
    }

    fn encode(&self, crop: &RgbImage) -> Result<Encoding, PipelineError> {
        let (w, h) = crop.dimensions();
        let mut tensor = ArrayD::zeros(IxDyn(&[h as usize, w as usize, 3]));
        for (x, y, pixel) in crop.enumerate_pixels() {
            for c in 0..3 {
                tensor[[y as usize, x as usize, c]] = pixel.0[c] as f32 / 255.0;
            }
        }

        // Keypoints on a ring in canonical space; depth tracks the local
        // luma so different faces encode differently.
        let mut keypoints = Array2::zeros((NUM_KEYPOINTS, 3));
        let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
        let radius = w.min(h) as f32 * 0.35;
        for j in 0..NUM_KEYPOINTS {
            let theta = j as f32 / NUM_KEYPOINTS as f32 * TAU;
            let sx = (cx + radius * theta.cos()).clamp(0.0, w as f32 - 1.0) as u32;
            let sy = (cy + radius * theta.sin()).clamp(0.0, h as f32 - 1.0) as u32;
            let pixel = crop.get_pixel(sx, sy);
            let luma = luma_of(pixel.0);
            keypoints[[j, 0]] = theta.cos() * 0.1;
            keypoints[[j, 1]] = theta.sin() * 0.1;
            keypoints[[j, 2]] = (luma / 255.0 - 0.5) * 0.02;
        }

        Ok(Encoding {
            appearance: AppearanceFeature(tensor),
            keypoints: KeypointInfo {
                keypoints,
                pose: Pose::identity(),
            },
        })
    }

    fn stitch(
        &self,
        _pose_keypoints: &Array2<f32>,
        target: &Array2<f32>,
        _appearance: &AppearanceFeature,
    ) -> Result<Array2<f32>, PipelineError> {
        // The neural stitcher corrects off-manifold edits; the synthetic
        // backend has no manifold, so the target passes through.
        Ok(target.to_owned())
    }

    fn warp_decode(
        &self,
        appearance: &AppearanceFeature,
        pose_keypoints: &Array2<f32>,
        target: &Array2<f32>,
    ) -> Result<RgbImage, PipelineError> {
        let shape = appearance.0.shape();
        if shape.len() != 3 || shape[2] != 3 {
            return Err(PipelineError::Inference(format!(
                "unexpected appearance shape: {shape:?}"
            )));
        }
        let (h, w) = (shape[0] as u32, shape[1] as u32);

        let n = target.nrows().min(pose_keypoints.nrows()).max(1) as f32;
        let dx = (target.column(0).sum() - pose_keypoints.column(0).sum()) / n;
        let dy = (target.column(1).sum() - pose_keypoints.column(1).sum()) / n;
        let shift_x = (dx * WARP_GAIN).round() as i64;
        let shift_y = (dy * WARP_GAIN).round() as i64;

        let mut out = RgbImage::new(w, h);
        for (x, y, pixel) in out.enumerate_pixels_mut() {
            let sx = (x as i64 - shift_x).clamp(0, w as i64 - 1) as usize;
            let sy = (y as i64 - shift_y).clamp(0, h as i64 - 1) as usize;
            for c in 0..3 {
                pixel.0[c] = (appearance.0[[sy, sx, c]] * 255.0).round().clamp(0.0, 255.0) as u8;
            }
        }
        Ok(out)
    }

    fn prepare_paste_back(
        &self,
        crop_to_original: &CropTransform,
        width: u32,
        height: u32,
    ) -> Result<GrayImage, PipelineError> {
        let inverse = crop_to_original
            .invert()
            .ok_or_else(|| PipelineError::Inference("singular crop transform".into()))?;

        let mut mask = GrayImage::new(width, height);
        let limit = CROP_SIZE as f32;
        for (x, y, pixel) in mask.enumerate_pixels_mut() {
            let (cx, cy) = inverse.apply(x as f32, y as f32);
            if cx >= 0.0 && cx < limit && cy >= 0.0 && cy < limit {
                pixel.0[0] = 255;
            }
        }
        Ok(mask)
    }

    fn paste_back(
        &self,
        rendered: &RgbImage,
        crop_to_original: &CropTransform,
        original: &RgbImage,
        mask: &GrayImage,
    ) -> Result<RgbImage, PipelineError> {
        let inverse = crop_to_original
            .invert()
            .ok_or_else(|| PipelineError::Inference("singular crop transform".into()))?;

        let (rw, rh) = rendered.dimensions();
        let mut out = original.clone();
        for (x, y, pixel) in out.enumerate_pixels_mut() {
            let weight = mask.get_pixel(x, y).0[0] as u32;
            if weight == 0 {
                continue;
            }
            let (cx, cy) = inverse.apply(x as f32, y as f32);
            let sx = (cx.round().max(0.0) as u32).min(rw - 1);
            let sy = (cy.round().max(0.0) as u32).min(rh - 1);
            let source = rendered.get_pixel(sx, sy);
            for c in 0..3 {
                let blended =
                    (source.0[c] as u32 * weight + pixel.0[c] as u32 * (255 - weight)) / 255;
                pixel.0[c] = blended as u8;
            }
        }
        Ok(out)
    }
}

fn luma_of(rgb: [u8; 3]) -> f32 {
    0.299 * rgb[0] as f32 + 0.587 * rgb[1] as f32 + 0.114 * rgb[2] as f32
}

fn luma_stddev(image: &RgbImage) -> f32 {
    let mut sum = 0.0_f64;
    let mut sum_sq = 0.0_f64;
    let count = (image.width() as f64 * image.height() as f64).max(1.0);
    for pixel in image.pixels() {
        let luma = luma_of(pixel.0) as f64;
        sum += luma;
        sum_sq += luma * luma;
    }
    let mean = sum / count;
    ((sum_sq / count - mean * mean).max(0.0) as f32).sqrt()
}
