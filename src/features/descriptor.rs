//! 64-element SURF descriptor.
//!
//! A square window of side `21s` is resampled in the keypoint's rotated
//! frame, area-reduced to 21x21, and differentiated with 2x2 Haar steps.
//! The 20x20 gradient field is Gaussian weighted (sigma 3.3) and pooled into
//! 4x4 cells of `(sum dx, sum dy, sum |dx|, sum |dy|)`.

use crate::features::{KeyPoint, DESCRIPTOR_SIZE};
use crate::image::ImageView;
use crate::util::math::{gaussian_kernel, sin_cos_deg};

const PATCH_SZ: usize = 20;
const DESC_SIGMA: f32 = 3.3;
const CELLS: usize = 4;
const CELL_SZ: usize = PATCH_SZ / CELLS;

pub(crate) struct DescriptorSampler {
    weights: Vec<f32>,
}

impl DescriptorSampler {
    pub(crate) fn new() -> Self {
        let gauss = gaussian_kernel(PATCH_SZ, DESC_SIGMA);
        let mut weights = Vec::with_capacity(PATCH_SZ * PATCH_SZ);
        for gy in gauss.iter() {
            for gx in gauss.iter() {
                weights.push(gy * gx);
            }
        }
        Self { weights }
    }

    pub(crate) fn compute(
        &self,
        image: ImageView<'_, u8>,
        kp: &KeyPoint,
    ) -> [f32; DESCRIPTOR_SIZE] {
        let s = kp.size * 1.2 / 9.0;
        let win_size = (((PATCH_SZ + 1) as f32 * s) as usize).max(PATCH_SZ + 1);
        let window = sample_window(image, kp, win_size);
        let patch = resize_area(&window, win_size, PATCH_SZ + 1);

        let side = PATCH_SZ + 1;
        let at = |i: usize, j: usize| patch[i * side + j];
        let mut dx = [0.0f32; PATCH_SZ * PATCH_SZ];
        let mut dy = [0.0f32; PATCH_SZ * PATCH_SZ];
        for i in 0..PATCH_SZ {
            for j in 0..PATCH_SZ {
                let w = self.weights[i * PATCH_SZ + j];
                let gx = at(i, j + 1) - at(i, j) + at(i + 1, j + 1) - at(i + 1, j);
                let gy = at(i + 1, j) - at(i, j) + at(i + 1, j + 1) - at(i, j + 1);
                dx[i * PATCH_SZ + j] = gx * w;
                dy[i * PATCH_SZ + j] = gy * w;
            }
        }

        let mut out = [0.0f32; DESCRIPTOR_SIZE];
        let mut square_mag = 0.0f32;
        for ci in 0..CELLS {
            for cj in 0..CELLS {
                let mut cell = [0.0f32; 4];
                for y in ci * CELL_SZ..(ci + 1) * CELL_SZ {
                    for x in cj * CELL_SZ..(cj + 1) * CELL_SZ {
                        let tx = dx[y * PATCH_SZ + x];
                        let ty = dy[y * PATCH_SZ + x];
                        cell[0] += tx;
                        cell[1] += ty;
                        cell[2] += tx.abs();
                        cell[3] += ty.abs();
                    }
                }
                let base = (ci * CELLS + cj) * 4;
                out[base..base + 4].copy_from_slice(&cell);
                square_mag += cell.iter().map(|v| v * v).sum::<f32>();
            }
        }

        let scale = 1.0 / (square_mag.sqrt() + f32::EPSILON);
        for v in out.iter_mut() {
            *v *= scale;
        }
        out
    }
}

/// Resamples a `win_size` square centred on the keypoint whose x axis
/// follows the keypoint angle. Samples outside the image take the nearest
/// border pixel.
fn sample_window(image: ImageView<'_, u8>, kp: &KeyPoint, win_size: usize) -> Vec<f32> {
    let (sin_a, cos_a) = sin_cos_deg(kp.angle);
    let offset = -(win_size as f32 - 1.0) * 0.5;
    let max_x = image.width() as isize - 1;
    let max_y = image.height() as isize - 1;
    let pixel = |x: isize, y: isize| -> f32 {
        let x = x.clamp(0, max_x) as usize;
        let y = y.clamp(0, max_y) as usize;
        image.get(x, y).copied().map(f32::from).unwrap_or(0.0)
    };

    let mut out = Vec::with_capacity(win_size * win_size);
    for i in 0..win_size {
        let v = offset + i as f32;
        for j in 0..win_size {
            let u = offset + j as f32;
            let px = kp.x + u * cos_a - v * sin_a;
            let py = kp.y + u * sin_a + v * cos_a;
            let x0 = px.floor();
            let y0 = py.floor();
            let (ix, iy) = (x0 as isize, y0 as isize);
            if ix >= 0 && iy >= 0 && ix < max_x && iy < max_y {
                let fx = px - x0;
                let fy = py - y0;
                let a = pixel(ix, iy);
                let b = pixel(ix + 1, iy);
                let c = pixel(ix, iy + 1);
                let d = pixel(ix + 1, iy + 1);
                let top = a * (1.0 - fx) + b * fx;
                let bottom = c * (1.0 - fx) + d * fx;
                out.push(top * (1.0 - fy) + bottom * fy);
            } else {
                out.push(pixel(ix, iy));
            }
        }
    }
    out
}

/// Per-destination source taps `(index, weight)` for 1D area resampling.
fn area_taps(src_len: usize, dst_len: usize) -> Vec<Vec<(usize, f32)>> {
    let scale = src_len as f32 / dst_len as f32;
    (0..dst_len)
        .map(|d| {
            let start = d as f32 * scale;
            let end = start + scale;
            let first = start.floor() as usize;
            let last = (end.ceil() as usize).min(src_len);
            (first..last)
                .filter_map(|k| {
                    let overlap = end.min(k as f32 + 1.0) - start.max(k as f32);
                    (overlap > 1e-6).then(|| (k, overlap / scale))
                })
                .collect()
        })
        .collect()
}

/// Square area resize of a `src_side`² buffer to `dst_side`².
fn resize_area(src: &[f32], src_side: usize, dst_side: usize) -> Vec<f32> {
    let taps = area_taps(src_side, dst_side);
    let mut rows = vec![0.0f32; src_side * dst_side];
    for y in 0..src_side {
        for (x, tap) in taps.iter().enumerate() {
            rows[y * dst_side + x] = tap.iter().map(|&(k, w)| src[y * src_side + k] * w).sum();
        }
    }
    let mut out = vec![0.0f32; dst_side * dst_side];
    for (y, tap) in taps.iter().enumerate() {
        for x in 0..dst_side {
            out[y * dst_side + x] = tap.iter().map(|&(k, w)| rows[k * dst_side + x] * w).sum();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{resize_area, DescriptorSampler};
    use crate::features::{KeyPoint, DESCRIPTOR_SIZE};
    use crate::ImageView;

    fn textured(width: usize, height: usize) -> Vec<u8> {
        (0..width * height)
            .map(|i| {
                let (x, y) = (i % width, i / width);
                (((x * 13) ^ (y * 7) ^ (x * y)) & 0xFF) as u8
            })
            .collect()
    }

    #[test]
    fn area_resize_preserves_mean() {
        let src: Vec<f32> = (0..49).map(|v| v as f32).collect();
        let out = resize_area(&src, 7, 3);
        let src_mean = src.iter().sum::<f32>() / 49.0;
        let out_mean = out.iter().sum::<f32>() / 9.0;
        assert!((src_mean - out_mean).abs() < 1e-3);
    }

    #[test]
    fn descriptor_is_unit_length() {
        let data = textured(96, 96);
        let view = ImageView::from_slice(&data, 96, 96).unwrap();
        let kp = KeyPoint {
            x: 48.0,
            y: 48.0,
            size: 21.0,
            angle: 30.0,
            response: 1000.0,
            octave: 0,
            laplacian: 1,
        };
        let desc = DescriptorSampler::new().compute(view, &kp);
        assert_eq!(desc.len(), DESCRIPTOR_SIZE);
        let norm: f32 = desc.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn flat_patch_gives_zero_descriptor() {
        let data = vec![90u8; 64 * 64];
        let view = ImageView::from_slice(&data, 64, 64).unwrap();
        let kp = KeyPoint {
            x: 32.0,
            y: 32.0,
            size: 15.0,
            angle: 0.0,
            response: 1.0,
            octave: 0,
            laplacian: 0,
        };
        let desc = DescriptorSampler::new().compute(view, &kp);
        assert!(desc.iter().all(|v| v.abs() < 1e-6));
    }
}
