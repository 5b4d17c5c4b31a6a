use ndarray::{array, Array2};

/// Ratio between the detected landmark spread and the reported box size, so
/// the box frames the whole head rather than the bare landmark hull.
const HEAD_SCALE: f32 = 1.5;

/// Affine transform (2×3, row-major) mapping crop-space pixels back to
/// original-image pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct CropTransform(Array2<f32>);

impl CropTransform {
    /// Wrap a 2×3 affine matrix.
    ///
    /// Panics if the shape is not 2×3; transforms are produced by the
    /// pipeline backends, never parsed from client input.
    pub fn new(matrix: Array2<f32>) -> Self {
        assert_eq!(matrix.dim(), (2, 3), "crop transform must be 2x3");
        Self(matrix)
    }

    pub fn identity() -> Self {
        Self(array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])
    }

    pub fn matrix(&self) -> &Array2<f32> {
        &self.0
    }

    /// Map a point through the transform.
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let m = &self.0;
        (
            m[[0, 0]] * x + m[[0, 1]] * y + m[[0, 2]],
            m[[1, 0]] * x + m[[1, 1]] * y + m[[1, 2]],
        )
    }

    /// Inverse affine, or `None` when the linear part is singular.
    pub fn invert(&self) -> Option<CropTransform> {
        let m = &self.0;
        let det = m[[0, 0]] * m[[1, 1]] - m[[0, 1]] * m[[1, 0]];
        if det.abs() < f32::EPSILON {
            return None;
        }
        let (a, b, tx) = (m[[0, 0]], m[[0, 1]], m[[0, 2]]);
        let (c, d, ty) = (m[[1, 0]], m[[1, 1]], m[[1, 2]]);
        let inv = array![
            [d / det, -b / det, (b * ty - d * tx) / det],
            [-c / det, a / det, (c * tx - a * ty) / det],
        ];
        Some(CropTransform(inv))
    }
}

/// Oriented face bounding box in original-image coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundingBox {
    pub center: [f32; 2],
    /// Side length of the square box.
    pub size: f32,
    /// Corner points in top-left, top-right, bottom-right, bottom-left order.
    pub corners: [[f32; 2]; 4],
    /// Rotation angle in radians, counter-clockwise.
    pub angle: f32,
}

impl BoundingBox {
    /// Derive an oriented box from a 2D landmark set (N × 2, image
    /// coordinates with y pointing down).
    ///
    /// The up axis runs from the lower landmark mass to the upper mass, the
    /// extent is the landmark spread along the rotated axes, and the side is
    /// inflated by `HEAD_SCALE`.
    pub fn from_landmarks(landmarks: &Array2<f32>) -> Self {
        let n = landmarks.nrows().max(1) as f32;
        let cx = landmarks.column(0).sum() / n;
        let cy = landmarks.column(1).sum() / n;

        // Mean of points above vs below the centroid gives the face axis.
        let (mut upper, mut lower) = ([0.0_f32; 2], [0.0_f32; 2]);
        let (mut n_upper, mut n_lower) = (0.0_f32, 0.0_f32);
        for row in landmarks.rows() {
            if row[1] < cy {
                upper[0] += row[0];
                upper[1] += row[1];
                n_upper += 1.0;
            } else {
                lower[0] += row[0];
                lower[1] += row[1];
                n_lower += 1.0;
            }
        }

        let mut up = [0.0_f32, -1.0];
        if n_upper > 0.0 && n_lower > 0.0 {
            let dx = upper[0] / n_upper - lower[0] / n_lower;
            let dy = upper[1] / n_upper - lower[1] / n_lower;
            let norm = (dx * dx + dy * dy).sqrt();
            if norm > f32::EPSILON {
                up = [dx / norm, dy / norm];
            }
        }
        // Rightward axis, perpendicular to up.
        let ux = [-up[1], up[0]];
        let angle = (-ux[1]).atan2(ux[0]);

        let mut half_w = 0.0_f32;
        let mut half_h = 0.0_f32;
        for row in landmarks.rows() {
            let (px, py) = (row[0] - cx, row[1] - cy);
            half_w = half_w.max((px * ux[0] + py * ux[1]).abs());
            half_h = half_h.max((px * up[0] + py * up[1]).abs());
        }
        let size = 2.0 * half_w.max(half_h) * HEAD_SCALE;

        let half = size / 2.0;
        let corner = |sx: f32, sy: f32| {
            [
                cx + sx * half * ux[0] + sy * half * up[0],
                cy + sx * half * ux[1] + sy * half * up[1],
            ]
        };

        Self {
            center: [cx, cy],
            size,
            corners: [
                corner(-1.0, 1.0),
                corner(1.0, 1.0),
                corner(1.0, -1.0),
                corner(-1.0, -1.0),
            ],
            angle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    fn ellipse_landmarks(cx: f32, cy: f32, rx: f32, ry: f32, n: usize) -> Array2<f32> {
        let mut pts = Array2::zeros((n, 2));
        for i in 0..n {
            let theta = i as f32 / n as f32 * TAU;
            pts[[i, 0]] = cx + rx * theta.cos();
            pts[[i, 1]] = cy + ry * theta.sin();
        }
        pts
    }

    #[test]
    fn upright_face_has_zero_angle() {
        let pts = ellipse_landmarks(100.0, 80.0, 30.0, 40.0, 106);
        let bbox = BoundingBox::from_landmarks(&pts);
        assert!(bbox.angle.abs() < 0.05, "angle: {}", bbox.angle);
        assert!((bbox.center[0] - 100.0).abs() < 1.0);
        assert!((bbox.center[1] - 80.0).abs() < 1.0);
    }

    #[test]
    fn box_covers_the_landmark_spread() {
        let pts = ellipse_landmarks(50.0, 50.0, 20.0, 25.0, 64);
        let bbox = BoundingBox::from_landmarks(&pts);
        // Largest landmark half-extent is 25, so the side must exceed 50.
        assert!(bbox.size >= 50.0);
    }

    #[test]
    fn corners_are_centered_on_the_box() {
        let pts = ellipse_landmarks(64.0, 64.0, 20.0, 30.0, 32);
        let bbox = BoundingBox::from_landmarks(&pts);
        let mean_x: f32 = bbox.corners.iter().map(|c| c[0]).sum::<f32>() / 4.0;
        let mean_y: f32 = bbox.corners.iter().map(|c| c[1]).sum::<f32>() / 4.0;
        assert!((mean_x - bbox.center[0]).abs() < 1e-3);
        assert!((mean_y - bbox.center[1]).abs() < 1e-3);
    }

    #[test]
    fn transform_roundtrips_through_inverse() {
        let transform = CropTransform::new(array![[2.0, 0.0, 10.0], [0.0, 2.0, -4.0]]);
        let inverse = transform.invert().unwrap();
        let (x, y) = transform.apply(3.0, 7.0);
        let (bx, by) = inverse.apply(x, y);
        assert!((bx - 3.0).abs() < 1e-5);
        assert!((by - 7.0).abs() < 1e-5);
    }

    #[test]
    fn singular_transform_has_no_inverse() {
        let transform = CropTransform::new(array![[1.0, 0.0, 0.0], [2.0, 0.0, 0.0]]);
        assert!(transform.invert().is_none());
    }

    #[test]
    fn identity_transform_maps_points_to_themselves() {
        let t = CropTransform::identity();
        assert_eq!(t.apply(5.0, -2.0), (5.0, -2.0));
    }
}
