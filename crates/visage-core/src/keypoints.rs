use ndarray::{array, Array1, Array2};

/// Number of motion keypoints produced by the encoder.
pub const NUM_KEYPOINTS: usize = 21;

/// Head pose scalars and translation produced by the motion encoder.
/// Angles are in degrees.
#[derive(Clone, Debug, PartialEq)]
pub struct Pose {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
    pub scale: f32,
    /// Length-3 translation applied after rotation and scaling.
    pub translation: Array1<f32>,
}

impl Pose {
    /// Identity pose: no rotation, unit scale, zero translation.
    pub fn identity() -> Self {
        Self {
            pitch: 0.0,
            yaw: 0.0,
            roll: 0.0,
            scale: 1.0,
            translation: Array1::zeros(3),
        }
    }
}

/// Canonical-space keypoints plus the pose they were observed under.
#[derive(Clone, Debug)]
pub struct KeypointInfo {
    /// `NUM_KEYPOINTS × 3`, canonical (pose-free) space.
    pub keypoints: Array2<f32>,
    pub pose: Pose,
}

/// Rotation matrix for Euler angles in degrees, composed `Rz·Ry·Rx` and
/// transposed so keypoints multiply on the left (`kp @ R`).
pub fn rotation_matrix(pitch: f32, yaw: f32, roll: f32) -> Array2<f32> {
    let p = pitch.to_radians();
    let y = yaw.to_radians();
    let r = roll.to_radians();

    let rot_x = array![
        [1.0, 0.0, 0.0],
        [0.0, p.cos(), -p.sin()],
        [0.0, p.sin(), p.cos()],
    ];
    let rot_y = array![
        [y.cos(), 0.0, y.sin()],
        [0.0, 1.0, 0.0],
        [-y.sin(), 0.0, y.cos()],
    ];
    let rot_z = array![
        [r.cos(), -r.sin(), 0.0],
        [r.sin(), r.cos(), 0.0],
        [0.0, 0.0, 1.0],
    ];

    rot_z.dot(&rot_y).dot(&rot_x).reversed_axes()
}

/// Project canonical keypoints through a pose, with optional extra rotation:
/// `scale * (kp @ R(pitch+dp, yaw+dy, roll+dr)) + translation`.
pub fn apply_pose(
    keypoints: &Array2<f32>,
    pose: &Pose,
    extra_pitch: f32,
    extra_yaw: f32,
    extra_roll: f32,
) -> Array2<f32> {
    let rot = rotation_matrix(
        pose.pitch + extra_pitch,
        pose.yaw + extra_yaw,
        pose.roll + extra_roll,
    );
    let mut out = keypoints.dot(&rot) * pose.scale;
    out += &pose.translation;
    out
}
