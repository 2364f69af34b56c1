//! Normalized direct linear transform.
//!
//! Both point sets are shifted to their centroid and scaled to a mean
//! distance of sqrt(2) before the 9x9 normal matrix is built; the solution
//! is the eigenvector of the smallest eigenvalue.

use nalgebra::{Matrix3, SMatrix, SVector};

type Normal = SMatrix<f64, 9, 9>;

/// Similarity that normalizes `points`; `None` when they coincide.
fn normalizer(points: &[(f64, f64)]) -> Option<Matrix3<f64>> {
    let n = points.len() as f64;
    let (cx, cy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x, sy + y));
    let (cx, cy) = (cx / n, cy / n);
    let mean_dist = points
        .iter()
        .map(|&(x, y)| ((x - cx).powi(2) + (y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if mean_dist < 1e-12 {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    Some(Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0))
}

fn apply(t: &Matrix3<f64>, (x, y): (f64, f64)) -> (f64, f64) {
    (t[(0, 0)] * x + t[(0, 2)], t[(1, 1)] * y + t[(1, 2)])
}

/// Least-squares homography mapping `src[i]` onto `dst[i]`.
pub(crate) fn fit(src: &[(f64, f64)], dst: &[(f64, f64)]) -> Option<Matrix3<f64>> {
    if src.len() < 4 || src.len() != dst.len() {
        return None;
    }
    let t_src = normalizer(src)?;
    let t_dst = normalizer(dst)?;

    let mut ata = Normal::zeros();
    for (&s, &d) in src.iter().zip(dst.iter()) {
        let (x, y) = apply(&t_src, s);
        let (u, v) = apply(&t_dst, d);
        let r1 = SVector::<f64, 9>::from_row_slice(&[-x, -y, -1.0, 0.0, 0.0, 0.0, u * x, u * y, u]);
        let r2 = SVector::<f64, 9>::from_row_slice(&[0.0, 0.0, 0.0, -x, -y, -1.0, v * x, v * y, v]);
        ata += r1 * r1.transpose() + r2 * r2.transpose();
    }

    let eig = ata.symmetric_eigen();
    let h = eig.eigenvectors.column(eig.eigenvalues.imin());
    let h_norm = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);
    let m = t_dst.try_inverse()? * h_norm * t_src;
    if !m.iter().all(|v| v.is_finite()) || m[(2, 2)].abs() < 1e-12 {
        return None;
    }
    Some(m / m[(2, 2)])
}

#[cfg(test)]
mod tests {
    use super::fit;
    use nalgebra::{Matrix3, Vector3};

    fn apply(m: &Matrix3<f64>, (x, y): (f64, f64)) -> (f64, f64) {
        let p = m * Vector3::new(x, y, 1.0);
        (p.x / p.z, p.y / p.z)
    }

    #[test]
    fn recovers_exact_homography_from_four_points() {
        let truth = Matrix3::new(0.9, -0.2, 30.0, 0.15, 1.1, -12.0, 0.0005, -0.0003, 1.0);
        let src = [(0.0, 0.0), (100.0, 0.0), (100.0, 80.0), (0.0, 80.0)];
        let dst: Vec<_> = src.iter().map(|&p| apply(&truth, p)).collect();
        let m = fit(&src, &dst).unwrap();
        for (i, j) in (0..3).flat_map(|i| (0..3).map(move |j| (i, j))) {
            assert!(
                (m[(i, j)] - truth[(i, j)]).abs() < 1e-6,
                "entry ({i},{j}): {} vs {}",
                m[(i, j)],
                truth[(i, j)]
            );
        }
    }

    #[test]
    fn coincident_points_fail() {
        let src = [(5.0, 5.0); 4];
        let dst = [(1.0, 1.0), (2.0, 2.0), (3.0, 1.0), (1.0, 3.0)];
        assert!(fit(&src, &dst).is_none());
    }
}
