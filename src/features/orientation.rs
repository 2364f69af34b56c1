//! Dominant orientation from Haar wavelet responses.
//!
//! Responses are sampled on a disc of radius `6s` around the keypoint and
//! weighted with a Gaussian (sigma 2.5 in units of `s`). A 60 degree window
//! slides around the circle in 5 degree steps; the window with the largest
//! summed response vector gives the orientation.

use crate::features::hessian::{eval_pattern, resize_pattern, BoxTerm};
use crate::features::KeyPoint;
use crate::image::IntegralImage;
use crate::util::math::{atan2_deg, gaussian_kernel};

const ORI_RADIUS: i32 = 6;
const ORI_SIGMA: f32 = 2.5;
const ORI_WIN_DEG: i32 = 60;
const ORI_SEARCH_INC_DEG: usize = 5;

const HAAR_X: [[i32; 5]; 2] = [[0, 0, 2, 4, -1], [2, 0, 4, 4, 1]];
const HAAR_Y: [[i32; 5]; 2] = [[0, 0, 4, 2, -1], [0, 2, 4, 4, 1]];

/// Precomputed sample offsets and Gaussian weights.
pub(crate) struct OrientationSampler {
    offsets: Vec<(f32, f32)>,
    weights: Vec<f32>,
}

impl OrientationSampler {
    pub(crate) fn new() -> Self {
        let gauss = gaussian_kernel((2 * ORI_RADIUS + 1) as usize, ORI_SIGMA);
        let mut offsets = Vec::new();
        let mut weights = Vec::new();
        for i in -ORI_RADIUS..=ORI_RADIUS {
            for j in -ORI_RADIUS..=ORI_RADIUS {
                if i * i + j * j <= ORI_RADIUS * ORI_RADIUS {
                    offsets.push((j as f32, i as f32));
                    weights.push(
                        gauss[(i + ORI_RADIUS) as usize] * gauss[(j + ORI_RADIUS) as usize],
                    );
                }
            }
        }
        Self { offsets, weights }
    }

    /// Returns the orientation in degrees, or `None` when the keypoint is
    /// too close to the border for any wavelet sample.
    pub(crate) fn dominant_angle(&self, integral: &IntegralImage, kp: &KeyPoint) -> Option<f32> {
        let s = kp.size * 1.2 / 9.0;
        let wavelet = 2 * (s * 2.0).round() as usize;
        let width = integral.width();
        let height = integral.height();
        if wavelet == 0 || height < wavelet || width < wavelet {
            return None;
        }
        let haar_x: Vec<BoxTerm> = resize_pattern(&HAAR_X, 4, wavelet);
        let haar_y: Vec<BoxTerm> = resize_pattern(&HAAR_Y, 4, wavelet);
        let half = (wavelet as f32 - 1.0) * 0.5;
        let max_x = (width + 1 - wavelet) as isize;
        let max_y = (height + 1 - wavelet) as isize;

        let mut samples = Vec::with_capacity(self.offsets.len());
        for (&(ox, oy), &w) in self.offsets.iter().zip(self.weights.iter()) {
            let x = (kp.x + ox * s - half).round() as isize;
            let y = (kp.y + oy * s - half).round() as isize;
            if x < 0 || y < 0 || x >= max_x || y >= max_y {
                continue;
            }
            let vx = eval_pattern(integral, &haar_x, x, y) * w;
            let vy = eval_pattern(integral, &haar_y, x, y) * w;
            samples.push((vx, vy, atan2_deg(vy, vx).round() as i32));
        }
        if samples.is_empty() {
            return None;
        }

        let mut best = (0.0f32, 0.0f32);
        let mut best_mag = 0.0f32;
        for window in (0..360).step_by(ORI_SEARCH_INC_DEG) {
            let window = window as i32;
            let (mut sum_x, mut sum_y) = (0.0f32, 0.0f32);
            for &(vx, vy, angle) in samples.iter() {
                let d = (angle - window).abs();
                if d < ORI_WIN_DEG / 2 || d > 360 - ORI_WIN_DEG / 2 {
                    sum_x += vx;
                    sum_y += vy;
                }
            }
            let mag = sum_x * sum_x + sum_y * sum_y;
            if mag > best_mag {
                best_mag = mag;
                best = (sum_x, sum_y);
            }
        }
        Some(atan2_deg(best.1, best.0))
    }
}

#[cfg(test)]
mod tests {
    use super::OrientationSampler;
    use crate::features::KeyPoint;
    use crate::image::IntegralImage;
    use crate::ImageView;

    fn keypoint(x: f32, y: f32) -> KeyPoint {
        KeyPoint {
            x,
            y,
            size: 15.0,
            angle: 0.0,
            response: 1000.0,
            octave: 0,
            laplacian: 1,
        }
    }

    #[test]
    fn horizontal_ramp_points_along_x() {
        let width = 80;
        let height = 80;
        let data: Vec<u8> = (0..width * height).map(|i| ((i % width) * 3) as u8).collect();
        let view = ImageView::from_slice(&data, width, height).unwrap();
        let integral = IntegralImage::new(view);
        let sampler = OrientationSampler::new();
        let angle = sampler.dominant_angle(&integral, &keypoint(40.0, 40.0)).unwrap();
        assert!(angle < 10.0 || angle > 350.0, "angle = {angle}");
    }

    #[test]
    fn vertical_ramp_points_along_y() {
        let width = 80;
        let height = 80;
        let data: Vec<u8> = (0..width * height).map(|i| ((i / width) * 3) as u8).collect();
        let view = ImageView::from_slice(&data, width, height).unwrap();
        let integral = IntegralImage::new(view);
        let sampler = OrientationSampler::new();
        let angle = sampler.dominant_angle(&integral, &keypoint(40.0, 40.0)).unwrap();
        assert!((angle - 90.0).abs() < 10.0, "angle = {angle}");
    }

    #[test]
    fn sample_disc_has_expected_size() {
        let sampler = OrientationSampler::new();
        assert_eq!(sampler.offsets.len(), 113);
        assert_eq!(sampler.offsets.len(), sampler.weights.len());
    }
}
