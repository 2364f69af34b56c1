//! RANSAC homography estimation.
//!
//! Minimal samples of four correspondences are drawn from a seeded RNG, so
//! a given input always produces the same estimate. The iteration budget
//! shrinks as better consensus sets are found, and the best consensus set
//! is refit with all of its inliers.

use crate::homography::dlt::fit;
use crate::homography::Homography;
use crate::trace::{trace_event, trace_span};
use crate::util::{SurfMatchError, SurfMatchResult};
use rand::rngs::StdRng;
use rand::SeedableRng;

const SAMPLE_SIZE: usize = 4;

/// Parameters of the robust estimator.
#[derive(Clone, Debug)]
pub struct RansacConfig {
    /// Maximum reprojection error in pixels for an inlier.
    pub reproj_threshold: f64,
    /// Upper bound on sampling iterations.
    pub max_iters: usize,
    /// Desired probability of drawing at least one outlier-free sample.
    pub confidence: f64,
    /// Seed for sample selection.
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            reproj_threshold: 2.0,
            max_iters: 2000,
            confidence: 0.995,
            seed: 0x5eed_1234,
        }
    }
}

impl RansacConfig {
    /// Checks that the parameters are usable.
    pub fn validate(&self) -> SurfMatchResult<()> {
        if !(self.reproj_threshold > 0.0 && self.reproj_threshold.is_finite()) {
            return Err(SurfMatchError::InvalidConfig(
                "reproj_threshold must be positive",
            ));
        }
        if self.max_iters == 0 {
            return Err(SurfMatchError::InvalidConfig("max_iters must be at least 1"));
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(SurfMatchError::InvalidConfig("confidence must be in (0, 1)"));
        }
        Ok(())
    }
}

/// A homography with the correspondences that support it.
#[derive(Clone, Debug)]
pub struct HomographyEstimate {
    pub homography: Homography,
    /// One flag per input correspondence.
    pub inliers: Vec<bool>,
}

impl HomographyEstimate {
    /// Number of supporting correspondences.
    pub fn inlier_count(&self) -> usize {
        self.inliers.iter().filter(|&&f| f).count()
    }
}

/// Robustly fits a homography mapping `src[i]` onto `dst[i]`.
///
/// Returns `None` when there are fewer than four correspondences, when
/// every sample is degenerate, or when the best model has fewer than four
/// inliers.
pub fn estimate_homography(
    src: &[(f32, f32)],
    dst: &[(f32, f32)],
    cfg: &RansacConfig,
) -> Option<HomographyEstimate> {
    let n = src.len();
    let _span = trace_span!("ransac_homography", correspondences = n).entered();
    if n < SAMPLE_SIZE || n != dst.len() {
        return None;
    }
    let src: Vec<(f64, f64)> = src.iter().map(|&(x, y)| (f64::from(x), f64::from(y))).collect();
    let dst: Vec<(f64, f64)> = dst.iter().map(|&(x, y)| (f64::from(x), f64::from(y))).collect();
    let threshold_sq = cfg.reproj_threshold * cfg.reproj_threshold;

    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let mut best: Option<(Homography, Vec<bool>, usize)> = None;
    let mut budget = cfg.max_iters;
    let mut iter = 0usize;

    while iter < budget {
        iter += 1;
        let sample = if n == SAMPLE_SIZE {
            vec![0, 1, 2, 3]
        } else {
            rand::seq::index::sample(&mut rng, n, SAMPLE_SIZE).into_vec()
        };
        let s_src: Vec<(f64, f64)> = sample.iter().map(|&i| src[i]).collect();
        let s_dst: Vec<(f64, f64)> = sample.iter().map(|&i| dst[i]).collect();
        if has_collinear_triple(&s_src) || has_collinear_triple(&s_dst) {
            if n == SAMPLE_SIZE {
                break;
            }
            continue;
        }
        let Some(m) = fit(&s_src, &s_dst) else {
            continue;
        };
        let h = Homography::from_matrix(m);
        let (mask, count) = consensus(&h, &src, &dst, threshold_sq);
        if best.as_ref().map_or(true, |(_, _, c)| count > *c) {
            let outlier_ratio = (n - count) as f64 / n as f64;
            budget = update_iterations(cfg.confidence, outlier_ratio, budget);
            best = Some((h, mask, count));
        }
        if n == SAMPLE_SIZE {
            break;
        }
    }

    let (h, mask, count) = best?;
    if count < SAMPLE_SIZE {
        return None;
    }

    let (in_src, in_dst): (Vec<_>, Vec<_>) = mask
        .iter()
        .zip(src.iter().zip(dst.iter()))
        .filter_map(|(&keep, (&s, &d))| keep.then_some((s, d)))
        .unzip();
    let (homography, inliers) = match fit(&in_src, &in_dst).map(Homography::from_matrix) {
        Some(refined) => {
            let (refined_mask, refined_count) = consensus(&refined, &src, &dst, threshold_sq);
            if refined_count >= count {
                (refined, refined_mask)
            } else {
                (h, mask)
            }
        }
        None => (h, mask),
    };

    let estimate = HomographyEstimate {
        homography,
        inliers,
    };
    trace_event!(
        "ransac_result",
        iterations = iter,
        inliers = estimate.inlier_count()
    );
    Some(estimate)
}

fn consensus(
    h: &Homography,
    src: &[(f64, f64)],
    dst: &[(f64, f64)],
    threshold_sq: f64,
) -> (Vec<bool>, usize) {
    let mut count = 0usize;
    let mask = src
        .iter()
        .zip(dst.iter())
        .map(|(&(x, y), &(u, v))| {
            let ok = h
                .project_f64(x, y)
                .map_or(false, |(px, py)| (px - u).powi(2) + (py - v).powi(2) <= threshold_sq);
            if ok {
                count += 1;
            }
            ok
        })
        .collect();
    (mask, count)
}

/// Number of iterations needed to reach `confidence` given the current
/// outlier ratio, never exceeding `max_iters`.
fn update_iterations(confidence: f64, outlier_ratio: f64, max_iters: usize) -> usize {
    let num = (1.0 - confidence).max(f64::MIN_POSITIVE);
    let denom = 1.0 - (1.0 - outlier_ratio).powi(SAMPLE_SIZE as i32);
    if denom < f64::MIN_POSITIVE {
        return 0;
    }
    let num = num.ln();
    let denom = denom.ln();
    if denom >= 0.0 || -num >= max_iters as f64 * -denom {
        max_iters
    } else {
        (num / denom).round() as usize
    }
}

fn has_collinear_triple(points: &[(f64, f64)]) -> bool {
    for i in 0..points.len() {
        for j in i + 1..points.len() {
            for k in j + 1..points.len() {
                let (ax, ay) = (points[j].0 - points[i].0, points[j].1 - points[i].1);
                let (bx, by) = (points[k].0 - points[i].0, points[k].1 - points[i].1);
                let cross = (ax * by - ay * bx).abs();
                let scale = (ax * ax + ay * ay).sqrt() * (bx * bx + by * by).sqrt();
                if cross <= f64::EPSILON * 10.0 * scale.max(1.0) {
                    return true;
                }
            }
        }
    }
    false
}
