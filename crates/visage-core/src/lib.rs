//! Shared data model for the visage portrait editing server: branded
//! identifiers, the protocol-facing error taxonomy, edit parameters, keypoint
//! and pose math, face geometry, and the immutable per-image feature bundle.

pub mod bundle;
pub mod errors;
pub mod geometry;
pub mod ids;
pub mod keypoints;
pub mod params;

pub use bundle::{AppearanceFeature, ContentHash, FaceFeatures, FeatureBundle};
pub use errors::VisageError;
pub use geometry::{BoundingBox, CropTransform};
pub use ids::{ClientId, SessionId};
pub use keypoints::{KeypointInfo, Pose, NUM_KEYPOINTS};
pub use params::EditParams;
