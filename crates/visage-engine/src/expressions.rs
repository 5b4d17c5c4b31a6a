//! Fixed expression-to-keypoint adjustment table.
//!
//! Each entry adds `value × coefficient` to one keypoint coordinate. Several
//! parameters may target the same coordinate; contributions sum. The
//! coefficients come from the reference motion model and are not tunable at
//! runtime.

use ndarray::Array2;
use visage_core::params::EditParams;

/// One additive adjustment: (landmark row, coordinate column, coefficient).
type Delta = (usize, usize, f32);

const SMILE: &[Delta] = &[
    (20, 1, -0.01),
    (14, 1, -0.02),
    (17, 1, 0.0065),
    (17, 2, 0.003),
    (13, 1, -0.00275),
    (16, 1, -0.00275),
    (3, 1, -0.0035),
    (7, 1, -0.0035),
];

const AAA: &[Delta] = &[(19, 1, 0.001), (19, 2, 0.0001), (17, 1, -0.0001)];

const EEE: &[Delta] = &[(20, 2, -0.001), (20, 1, -0.001), (14, 1, -0.001)];

const WOO: &[Delta] = &[
    (14, 1, 0.001),
    (3, 1, -0.0005),
    (7, 1, -0.0005),
    (17, 2, -0.0005),
];

const WINK: &[Delta] = &[
    (11, 1, 0.001),
    (13, 1, -0.0003),
    (17, 0, 0.0003),
    (17, 1, 0.0003),
    (3, 1, -0.0003),
];

const PUPIL_Y: &[Delta] = &[(11, 1, -0.001), (15, 1, -0.001)];

const EYES: &[Delta] = &[
    (11, 1, -0.001),
    (13, 1, 0.0003),
    (15, 1, -0.001),
    (16, 1, 0.0003),
    (1, 1, -0.00025),
    (2, 1, 0.00025),
];

fn add(kp: &mut Array2<f32>, value: f32, deltas: &[Delta]) {
    for &(row, col, coeff) in deltas {
        kp[[row, col]] += value * coeff;
    }
}

/// Accumulate every expression delta into `kp`.
///
/// Couplings: `pupil_x` and `eyebrow` branch between two literal coefficient
/// sets on the sign of the value; `pupil_y` perturbs the iris rows directly
/// on top of its table entries, and the `eyes` table contribution is computed
/// from `eyes - pupil_y / 2` rather than the raw `eyes` input.
pub fn accumulate(kp: &mut Array2<f32>, params: &EditParams) {
    add(kp, params.smile, SMILE);
    add(kp, params.aaa, AAA);
    add(kp, params.eee, EEE);
    add(kp, params.woo, WOO);
    add(kp, params.wink, WINK);

    let (iris_left, iris_right) = if params.pupil_x > 0.0 {
        (0.0007, 0.001)
    } else {
        (0.001, 0.0007)
    };
    kp[[11, 0]] += params.pupil_x * iris_left;
    kp[[15, 0]] += params.pupil_x * iris_right;

    add(kp, params.pupil_y, PUPIL_Y);
    kp[[11, 1]] -= params.pupil_y * 0.001;
    kp[[15, 1]] -= params.pupil_y * 0.001;

    add(kp, params.eyes - params.pupil_y / 2.0, EYES);

    if params.eyebrow > 0.0 {
        kp[[1, 1]] += params.eyebrow * 0.001;
        kp[[2, 1]] -= params.eyebrow * 0.001;
    } else {
        kp[[1, 1]] += params.eyebrow * 0.0003;
        kp[[2, 1]] -= params.eyebrow * 0.0003;
        kp[[1, 0]] -= params.eyebrow * 0.001;
        kp[[2, 0]] += params.eyebrow * 0.001;
    }
}
