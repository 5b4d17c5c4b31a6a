use image::RgbImage;
use ndarray::Array2;
use visage_core::bundle::AppearanceFeature;
use visage_core::geometry::CropTransform;
use visage_core::keypoints::KeypointInfo;

/// Side length of the aligned crop fed to the encoders.
pub const CROP_SIZE: u32 = 256;

/// 2D face landmarks (N × 2) in image coordinates.
pub type Landmarks = Array2<f32>;

/// Result of face detection plus crop alignment.
#[derive(Clone, Debug)]
pub struct FaceCrop {
    /// `CROP_SIZE × CROP_SIZE` aligned crop.
    pub crop: RgbImage,
    /// Landmarks of the selected face, original-image coordinates.
    pub landmarks: Landmarks,
    /// Crop-space → original-space transform.
    pub crop_to_original: CropTransform,
    /// How many candidate faces the detector saw; callers log when more than
    /// one was resolved by the selection rule.
    pub candidates: usize,
}

/// Output of the appearance and motion encoders.
#[derive(Clone, Debug)]
pub struct Encoding {
    pub appearance: AppearanceFeature,
    pub keypoints: KeypointInfo,
}
