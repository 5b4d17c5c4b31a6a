use std::fmt;

use chrono::{DateTime, Utc};
use image::RgbImage;
use ndarray::{Array2, ArrayD};
use sha2::{Digest, Sha256};

use crate::geometry::{BoundingBox, CropTransform};
use crate::ids::SessionId;
use crate::keypoints::KeypointInfo;

/// SHA-256 fingerprint of an uploaded image's raw bytes. Equal iff the input
/// byte sequences were equal.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn of(bytes: &[u8]) -> Self {
        use std::fmt::Write;
        let digest = Sha256::digest(bytes);
        let mut hex = String::with_capacity(64);
        for byte in digest {
            let _ = write!(hex, "{byte:02x}");
        }
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque feature tensor produced by the appearance encoder and consumed only
/// by the render stages.
#[derive(Clone, Debug)]
pub struct AppearanceFeature(pub ArrayD<f32>);

/// Everything the extractor computes for one image, before a session id is
/// assigned.
#[derive(Clone, Debug)]
pub struct FaceFeatures {
    /// Canonical keypoints plus the observed pose.
    pub baseline: KeypointInfo,
    /// Pose-applied baseline (`scale * (kp @ R) + t`); both the stitcher and
    /// the warp/decode stage consume this form.
    pub pose_keypoints: Array2<f32>,
    pub appearance: AppearanceFeature,
    /// Crop-space → original-space transform retained from alignment.
    pub crop_to_original: CropTransform,
    /// Decoded source pixels at extraction resolution.
    pub original_image: RgbImage,
    /// Face region in original-image coordinates.
    pub bounding_box: BoundingBox,
}

/// Immutable product of one successful extraction, as tracked by the session
/// store. Shared across connections as `Arc<FeatureBundle>`; never mutated
/// after creation.
#[derive(Clone, Debug)]
pub struct FeatureBundle {
    pub session_id: SessionId,
    pub content_hash: ContentHash,
    pub features: FaceFeatures,
    pub created_at: DateTime<Utc>,
}

impl FeatureBundle {
    pub fn new(session_id: SessionId, content_hash: ContentHash, features: FaceFeatures) -> Self {
        Self {
            session_id,
            content_hash,
            features,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_bytes_hash_equal() {
        let a = ContentHash::of(b"same bytes");
        let b = ContentHash::of(b"same bytes");
        assert_eq!(a, b);
    }

    #[test]
    fn different_bytes_hash_differently() {
        let a = ContentHash::of(b"bytes a");
        let b = ContentHash::of(b"bytes b");
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_lowercase_hex() {
        let hash = ContentHash::of(b"");
        assert_eq!(hash.as_str().len(), 64);
        assert!(hash.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        // SHA-256 of the empty string is a fixed vector.
        assert!(hash.as_str().starts_with("e3b0c442"));
    }
}
