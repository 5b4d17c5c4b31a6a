//! Pure keypoint edit algebra.

use ndarray::Array2;
use visage_core::keypoints::{apply_pose, Pose};
use visage_core::params::EditParams;

use crate::expressions;

/// Apply named edits to canonical keypoints and project through the pose:
/// additive expression deltas first, then one rigid transform
/// `scale * (kp @ R(pose + rotate)) + t`.
///
/// Deterministic, no I/O, and the baseline is never mutated. The rotation
/// mixes coordinates, so running it before the delta pass would change the
/// output — the phase order is part of the contract.
pub fn apply(baseline: &Array2<f32>, pose: &Pose, params: &EditParams) -> Array2<f32> {
    let mut kp = baseline.clone();
    expressions::accumulate(&mut kp, params);
    apply_pose(
        &kp,
        pose,
        params.rotate_pitch,
        params.rotate_yaw,
        params.rotate_roll,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use visage_core::keypoints::{rotation_matrix, NUM_KEYPOINTS};

    fn sample_baseline() -> Array2<f32> {
        let mut kp = Array2::zeros((NUM_KEYPOINTS, 3));
        for j in 0..NUM_KEYPOINTS {
            kp[[j, 0]] = (j as f32 * 0.7).sin() * 0.1;
            kp[[j, 1]] = (j as f32 * 1.3).cos() * 0.1;
            kp[[j, 2]] = (j as f32 * 0.2).sin() * 0.05;
        }
        kp
    }

    fn sample_pose() -> Pose {
        Pose {
            pitch: 8.0,
            yaw: -12.0,
            roll: 3.0,
            scale: 1.4,
            translation: array![0.05_f32, -0.1, 0.02],
        }
    }

    #[test]
    fn apply_is_deterministic() {
        let baseline = sample_baseline();
        let pose = sample_pose();
        let params = EditParams {
            smile: 1.3,
            pupil_x: -0.4,
            eyes: 0.02,
            pupil_y: 0.01,
            rotate_yaw: 15.0,
            ..Default::default()
        };

        let a = apply(&baseline, &pose, &params);
        let b = apply(&baseline, &pose, &params);
        assert_eq!(a, b);
    }

    #[test]
    fn apply_leaves_the_baseline_untouched() {
        let baseline = sample_baseline();
        let snapshot = baseline.clone();
        let _ = apply(
            &baseline,
            &sample_pose(),
            &EditParams {
                smile: 2.0,
                ..Default::default()
            },
        );
        assert_eq!(baseline, snapshot);
    }

    #[test]
    fn zero_edit_is_pure_pose_reconstruction() {
        let baseline = sample_baseline();
        let pose = sample_pose();
        let out = apply(&baseline, &pose, &EditParams::default());

        let rot = rotation_matrix(pose.pitch, pose.yaw, pose.roll);
        let mut expected = baseline.dot(&rot) * pose.scale;
        expected += &pose.translation;

        assert_eq!(out, expected);
    }

    #[test]
    fn rotation_params_add_to_the_pose_angles() {
        let baseline = sample_baseline();
        let pose = sample_pose();
        let out = apply(
            &baseline,
            &pose,
            &EditParams {
                rotate_pitch: 5.0,
                rotate_yaw: -3.0,
                rotate_roll: 10.0,
                ..Default::default()
            },
        );

        let rot = rotation_matrix(pose.pitch + 5.0, pose.yaw - 3.0, pose.roll + 10.0);
        let mut expected = baseline.dot(&rot) * pose.scale;
        expected += &pose.translation;
        assert_eq!(out, expected);
    }

    #[test]
    fn pupil_y_eyes_coupling_matches_hand_computed_tensor() {
        // Identity pose isolates the delta pass so each affected coordinate
        // can be compared against an explicitly constructed expectation.
        let baseline = sample_baseline();
        let pose = Pose::identity();
        let (eyes, pupil_y) = (0.02_f32, 0.01_f32);

        let out = apply(
            &baseline,
            &pose,
            &EditParams {
                eyes,
                pupil_y,
                ..Default::default()
            },
        );

        let mut expected = baseline.clone();
        let effective = eyes - pupil_y / 2.0;
        // pupil_y table entries plus the direct iris perturbation.
        expected[[11, 1]] += pupil_y * -0.001 - pupil_y * 0.001;
        expected[[15, 1]] += pupil_y * -0.001 - pupil_y * 0.001;
        // eyes table entries at the effective value.
        expected[[11, 1]] += effective * -0.001;
        expected[[13, 1]] += effective * 0.0003;
        expected[[15, 1]] += effective * -0.001;
        expected[[16, 1]] += effective * 0.0003;
        expected[[1, 1]] += effective * -0.00025;
        expected[[2, 1]] += effective * 0.00025;

        for (a, b) in out.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-7, "{a} != {b}");
        }
    }

    #[test]
    fn expression_deltas_happen_before_the_rigid_transform() {
        // With a 90-degree roll the smile's y-deltas must land rotated into
        // the output; applying them after the transform would leave them on
        // the y axis.
        let baseline = Array2::zeros((NUM_KEYPOINTS, 3));
        let pose = Pose {
            roll: 90.0,
            ..Pose::identity()
        };
        let out = apply(
            &baseline,
            &pose,
            &EditParams {
                smile: 1.0,
                ..Default::default()
            },
        );

        // Row 20 receives (0, -0.01, 0) pre-rotation; after a 90-degree roll
        // the delta must have left the y column.
        assert!(out[[20, 0]].abs() > 1e-4);
        assert!(out[[20, 1]].abs() < 1e-6);
    }
}
