//! Fast-Hessian scale space and keypoint localization.
//!
//! Filter sizes start at 9 and grow by 6 per layer; octave `o` doubles the
//! sizes and samples every `2^o` pixels. Box weights are normalized by box
//! area, so the determinant threshold is independent of the filter size.

use crate::features::{KeyPoint, SurfConfig};
use crate::image::IntegralImage;
use crate::trace::trace_debug;
use nalgebra::{Matrix3, Vector3};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

const HAAR_SIZE0: usize = 9;
const HAAR_SIZE_INC: usize = 6;
/// Relative weight of the mixed derivative in the determinant.
const DXY_WEIGHT: f32 = 0.81;

// Box layouts for the 9x9 base filter: [x0, y0, x1, y1, weight].
const DXX: [[i32; 5]; 3] = [[0, 2, 3, 7, 1], [3, 2, 6, 7, -2], [6, 2, 9, 7, 1]];
const DYY: [[i32; 5]; 3] = [[2, 0, 7, 3, 1], [2, 3, 7, 6, -2], [2, 6, 7, 9, 1]];
const DXY: [[i32; 5]; 4] = [
    [1, 1, 4, 4, 1],
    [5, 1, 8, 4, -1],
    [1, 5, 4, 8, -1],
    [5, 5, 8, 8, 1],
];

/// One weighted box of a Haar-like pattern, relative to the pattern origin.
#[derive(Clone, Copy, Debug)]
pub(crate) struct BoxTerm {
    x0: isize,
    y0: isize,
    x1: isize,
    y1: isize,
    weight: f32,
}

/// Scales a pattern defined on an `old_size` grid to `new_size`, dividing
/// each weight by its box area.
pub(crate) fn resize_pattern(src: &[[i32; 5]], old_size: usize, new_size: usize) -> Vec<BoxTerm> {
    let ratio = new_size as f32 / old_size as f32;
    src.iter()
        .map(|b| {
            let x0 = (ratio * b[0] as f32).round() as isize;
            let y0 = (ratio * b[1] as f32).round() as isize;
            let x1 = (ratio * b[2] as f32).round() as isize;
            let y1 = (ratio * b[3] as f32).round() as isize;
            let area = ((x1 - x0) * (y1 - y0)).max(1) as f32;
            BoxTerm {
                x0,
                y0,
                x1,
                y1,
                weight: b[4] as f32 / area,
            }
        })
        .collect()
}

/// Evaluates a pattern with its origin at `(x, y)`.
#[inline]
pub(crate) fn eval_pattern(
    integral: &IntegralImage,
    pattern: &[BoxTerm],
    x: isize,
    y: isize,
) -> f32 {
    pattern
        .iter()
        .map(|b| b.weight * integral.box_sum(x + b.x0, y + b.y0, x + b.x1, y + b.y1))
        .sum()
}

/// Determinant and trace responses of one filter size on its sample grid.
struct ResponseLayer {
    size: usize,
    rows: usize,
    cols: usize,
    det: Vec<f32>,
    trace: Vec<f32>,
}

impl ResponseLayer {
    #[inline]
    fn det_at(&self, i: usize, j: usize) -> f32 {
        self.det[i * self.cols + j]
    }
}

fn build_layer(
    integral: &IntegralImage,
    size: usize,
    step: usize,
    parallel: bool,
) -> ResponseLayer {
    let height = integral.height();
    let width = integral.width();
    let rows = height / step;
    let cols = width / step;
    let mut layer = ResponseLayer {
        size,
        rows,
        cols,
        det: vec![0.0; rows * cols],
        trace: vec![0.0; rows * cols],
    };
    if size > height || size > width {
        return layer;
    }

    let dxx = resize_pattern(&DXX, HAAR_SIZE0, size);
    let dyy = resize_pattern(&DYY, HAAR_SIZE0, size);
    let dxy = resize_pattern(&DXY, HAAR_SIZE0, size);
    let samples_i = 1 + (height - size) / step;
    let samples_j = 1 + (width - size) / step;
    let margin = (size / 2) / step;

    let compute_row = |i: usize| -> Vec<(f32, f32)> {
        let y = (i * step) as isize;
        (0..samples_j)
            .map(|j| {
                let x = (j * step) as isize;
                let dx = eval_pattern(integral, &dxx, x, y);
                let dy = eval_pattern(integral, &dyy, x, y);
                let dxy = eval_pattern(integral, &dxy, x, y);
                (dx * dy - DXY_WEIGHT * dxy * dxy, dx + dy)
            })
            .collect()
    };

    #[cfg(feature = "rayon")]
    let row_values: Vec<Vec<(f32, f32)>> = if parallel {
        (0..samples_i).into_par_iter().map(compute_row).collect()
    } else {
        (0..samples_i).map(compute_row).collect()
    };
    #[cfg(not(feature = "rayon"))]
    let row_values: Vec<Vec<(f32, f32)>> = {
        let _ = parallel;
        (0..samples_i).map(compute_row).collect()
    };

    for (i, values) in row_values.into_iter().enumerate() {
        let r = i + margin;
        if r >= rows {
            break;
        }
        for (j, (det, trace)) in values.into_iter().enumerate() {
            let c = j + margin;
            if c >= cols {
                break;
            }
            layer.det[r * cols + c] = det;
            layer.trace[r * cols + c] = trace;
        }
    }
    layer
}

/// Finds scale-space maxima over all octaves.
pub(crate) fn detect(integral: &IntegralImage, cfg: &SurfConfig, parallel: bool) -> Vec<KeyPoint> {
    let layers_per_octave = cfg.octave_layers + 2;
    let mut keypoints = Vec::new();

    for octave in 0..cfg.octaves {
        let step = 1usize << octave;
        if integral.width() / step < 3 || integral.height() / step < 3 {
            break;
        }
        let layers: Vec<ResponseLayer> = (0..layers_per_octave)
            .map(|l| {
                let size = (HAAR_SIZE0 + HAAR_SIZE_INC * l) << octave;
                build_layer(integral, size, step, parallel)
            })
            .collect();

        let before = keypoints.len();
        for middle in 1..=cfg.octave_layers {
            find_maxima(&layers, middle, octave, step, cfg.hessian_threshold, &mut keypoints);
        }
        trace_debug!(
            "hessian_octave",
            octave = octave,
            found = keypoints.len() - before
        );
    }
    keypoints
}

fn find_maxima(
    layers: &[ResponseLayer],
    middle: usize,
    octave: usize,
    step: usize,
    threshold: f32,
    out: &mut Vec<KeyPoint>,
) {
    let below = &layers[middle - 1];
    let layer = &layers[middle];
    let above = &layers[middle + 1];
    let size = layer.size;
    let margin = (above.size / 2) / step + 1;
    if layer.rows <= 2 * margin || layer.cols <= 2 * margin {
        return;
    }

    for i in margin..layer.rows - margin {
        for j in margin..layer.cols - margin {
            let val0 = layer.det_at(i, j);
            if val0 <= threshold {
                continue;
            }

            // 3x3 neighbourhoods of the three layers, row-major, centre at 4.
            let mut n9 = [[0.0f32; 9]; 3];
            for (l, src) in [below, layer, above].into_iter().enumerate() {
                for di in 0..3 {
                    for dj in 0..3 {
                        n9[l][di * 3 + dj] = src.det_at(i + di - 1, j + dj - 1);
                    }
                }
            }
            let is_max = n9
                .iter()
                .enumerate()
                .all(|(l, n)| n.iter().enumerate().all(|(k, &v)| (l == 1 && k == 4) || val0 > v));
            if !is_max {
                continue;
            }

            let sum_i = (step * (i - (size / 2) / step)) as f32;
            let sum_j = (step * (j - (size / 2) / step)) as f32;
            let trace = layer.trace[i * layer.cols + j];
            let mut kp = KeyPoint {
                x: sum_j + (size as f32 - 1.0) * 0.5,
                y: sum_i + (size as f32 - 1.0) * 0.5,
                size: size as f32,
                angle: 0.0,
                response: val0,
                octave,
                laplacian: if trace > 0.0 {
                    1
                } else if trace < 0.0 {
                    -1
                } else {
                    0
                },
            };
            let ds = (size - below.size) as f32;
            if interpolate(&n9, step as f32, ds, &mut kp) {
                out.push(kp);
            }
        }
    }
}

/// Fits a 3D quadratic to the neighbourhood and shifts the keypoint to its
/// peak. Returns `false` when the offset leaves the sample cell.
fn interpolate(n9: &[[f32; 9]; 3], step: f32, ds: f32, kp: &mut KeyPoint) -> bool {
    let b = Vector3::new(
        -(n9[1][5] - n9[1][3]) / 2.0,
        -(n9[1][7] - n9[1][1]) / 2.0,
        -(n9[2][4] - n9[0][4]) / 2.0,
    );
    let dxx = n9[1][3] - 2.0 * n9[1][4] + n9[1][5];
    let dxy = (n9[1][8] - n9[1][6] - n9[1][2] + n9[1][0]) / 4.0;
    let dxs = (n9[2][5] - n9[2][3] - n9[0][5] + n9[0][3]) / 4.0;
    let dyy = n9[1][1] - 2.0 * n9[1][4] + n9[1][7];
    let dys = (n9[2][7] - n9[2][1] - n9[0][7] + n9[0][1]) / 4.0;
    let dss = n9[0][4] - 2.0 * n9[1][4] + n9[2][4];
    let a = Matrix3::new(dxx, dxy, dxs, dxy, dyy, dys, dxs, dys, dss);

    let Some(x) = a.lu().solve(&b) else {
        return false;
    };
    let ok = (x[0] != 0.0 || x[1] != 0.0 || x[2] != 0.0)
        && x.iter().all(|v| v.is_finite() && v.abs() <= 1.0);
    if ok {
        kp.x += x[0] * step;
        kp.y += x[1] * step;
        kp.size = (kp.size + x[2] * ds).round();
    }
    ok
}

#[cfg(test)]
mod tests {
    use super::{detect, eval_pattern, resize_pattern, DXX, DXY, HAAR_SIZE0};
    use crate::features::SurfConfig;
    use crate::image::IntegralImage;
    use crate::ImageView;

    #[test]
    fn resized_pattern_is_zero_mean() {
        let pattern = resize_pattern(&DXX, HAAR_SIZE0, 15);
        let data = [77u8; 400];
        let view = ImageView::from_slice(&data, 20, 20).unwrap();
        let integral = IntegralImage::new(view);
        let response = eval_pattern(&integral, &pattern, 2, 2);
        assert!(response.abs() < 1e-3, "flat image response {response}");

        let dxy = resize_pattern(&DXY, HAAR_SIZE0, 9);
        assert!(eval_pattern(&integral, &dxy, 0, 0).abs() < 1e-3);
    }

    #[test]
    fn flat_image_has_no_keypoints() {
        let data = vec![128u8; 64 * 64];
        let view = ImageView::from_slice(&data, 64, 64).unwrap();
        let integral = IntegralImage::new(view);
        assert!(detect(&integral, &SurfConfig::default(), false).is_empty());
    }

    #[test]
    fn dark_blob_is_detected_near_its_centre() {
        let width = 64;
        let height = 64;
        let mut data = vec![220u8; width * height];
        for y in 0..height {
            for x in 0..width {
                let dx = x as f32 - 32.0;
                let dy = y as f32 - 32.0;
                if dx * dx + dy * dy <= 12.25 {
                    data[y * width + x] = 20;
                }
            }
        }
        let view = ImageView::from_slice(&data, width, height).unwrap();
        let integral = IntegralImage::new(view);
        let keypoints = detect(&integral, &SurfConfig::default(), false);
        assert!(!keypoints.is_empty());
        let best = keypoints
            .iter()
            .max_by(|a, b| a.response.total_cmp(&b.response))
            .unwrap();
        assert!((best.x - 32.0).abs() < 3.0, "x = {}", best.x);
        assert!((best.y - 32.0).abs() < 3.0, "y = {}", best.y);
        assert_eq!(best.laplacian, 1);
    }
}
