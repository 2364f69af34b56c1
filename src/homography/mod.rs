//! Planar homographies: fitting, robust estimation and point projection.

mod dlt;
mod ransac;

pub use ransac::{estimate_homography, HomographyEstimate, RansacConfig};

use nalgebra::{Matrix3, Vector3};

/// A 3x3 projective transform mapping model coordinates to observed
/// coordinates, normalized so that `h[(2, 2)] == 1` when possible.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    m: Matrix3<f64>,
}

impl Homography {
    /// Wraps a matrix, rescaling it so the bottom-right entry is 1.
    pub fn from_matrix(m: Matrix3<f64>) -> Self {
        let scale = m[(2, 2)];
        if scale.abs() > f64::EPSILON {
            Self { m: m / scale }
        } else {
            Self { m }
        }
    }

    /// Returns the underlying matrix.
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.m
    }

    /// Projects one point; `None` when it maps to infinity.
    pub fn project(&self, x: f32, y: f32) -> Option<(f32, f32)> {
        let (px, py) = self.project_f64(f64::from(x), f64::from(y))?;
        Some((px as f32, py as f32))
    }

    pub(crate) fn project_f64(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let p = self.m * Vector3::new(x, y, 1.0);
        if p.z.abs() < f64::EPSILON {
            return None;
        }
        let out = (p.x / p.z, p.y / p.z);
        (out.0.is_finite() && out.1.is_finite()).then_some(out)
    }

    /// Projects every point, failing if any maps to infinity.
    pub fn project_points(&self, points: &[(f32, f32)]) -> Option<Vec<(f32, f32)>> {
        points.iter().map(|&(x, y)| self.project(x, y)).collect()
    }

    /// Returns the inverse transform, if the matrix is invertible.
    pub fn inverse(&self) -> Option<Self> {
        self.m.try_inverse().map(Self::from_matrix)
    }

    /// Rejects transforms that flip, collapse or wildly stretch the model.
    ///
    /// The upper-left block must keep orientation and its column norms must
    /// stay within `[0.1, 4]`; the perspective terms must be small.
    pub fn is_well_conditioned(&self) -> bool {
        let m = &self.m;
        let det = m[(0, 0)] * m[(1, 1)] - m[(1, 0)] * m[(0, 1)];
        if !(det > 0.0) {
            return false;
        }
        let n1 = (m[(0, 0)].powi(2) + m[(1, 0)].powi(2)).sqrt();
        let n2 = (m[(0, 1)].powi(2) + m[(1, 1)].powi(2)).sqrt();
        let n3 = (m[(2, 0)].powi(2) + m[(2, 1)].powi(2)).sqrt();
        (0.1..=4.0).contains(&n1) && (0.1..=4.0).contains(&n2) && n3 <= 0.002
    }
}

#[cfg(test)]
mod tests {
    use super::Homography;
    use nalgebra::Matrix3;

    #[test]
    fn translation_projects_points() {
        let m = Matrix3::new(2.0, 0.0, 20.0, 0.0, 2.0, -8.0, 0.0, 0.0, 2.0);
        let h = Homography::from_matrix(m);
        let (x, y) = h.project(3.0, 4.0).unwrap();
        assert!((x - 13.0).abs() < 1e-5);
        assert!((y - 0.0).abs() < 1e-5);
        assert!(h.is_well_conditioned());
    }

    #[test]
    fn point_at_infinity_is_none() {
        let h = Homography::from_matrix(Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0));
        assert!(h.project(0.0, 5.0).is_none());
        assert!(h.project_points(&[(1.0, 1.0), (0.0, 1.0)]).is_none());
    }

    #[test]
    fn inverse_round_trips() {
        let h = Homography::from_matrix(Matrix3::new(
            1.1, 0.1, 5.0, -0.05, 0.9, 7.0, 0.0001, 0.0002, 1.0,
        ));
        let inv = h.inverse().unwrap();
        let (x, y) = h.project(10.0, 20.0).unwrap();
        let (bx, by) = inv.project(x, y).unwrap();
        assert!((bx - 10.0).abs() < 1e-3 && (by - 20.0).abs() < 1e-3);
    }

    #[test]
    fn mirrored_or_degenerate_transforms_are_rejected() {
        let mirror =
            Homography::from_matrix(Matrix3::new(-1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0));
        assert!(!mirror.is_well_conditioned());
        let squash =
            Homography::from_matrix(Matrix3::new(0.01, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0));
        assert!(!squash.is_well_conditioned());
        let perspective =
            Homography::from_matrix(Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.01, 0.0, 1.0));
        assert!(!perspective.is_well_conditioned());
        assert!(Homography::from_matrix(Matrix3::identity()).is_well_conditioned());
    }
}
