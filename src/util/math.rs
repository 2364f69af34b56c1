//! Numeric helpers shared by the detector, the voting filters and drawing.

/// Wraps an angle in degrees to the range [0, 360).
pub(crate) fn wrap_360(angle_deg: f32) -> f32 {
    let wrapped = angle_deg % 360.0;
    if wrapped < 0.0 {
        let shifted = wrapped + 360.0;
        // -1e-7 + 360.0 rounds to 360.0 in f32.
        if shifted >= 360.0 {
            0.0
        } else {
            shifted
        }
    } else {
        wrapped
    }
}

/// Computes sine and cosine for an angle in degrees.
pub(crate) fn sin_cos_deg(angle_deg: f32) -> (f32, f32) {
    angle_deg.to_radians().sin_cos()
}

/// Returns the angle of `(x, y)` in degrees within [0, 360).
pub(crate) fn atan2_deg(y: f32, x: f32) -> f32 {
    wrap_360(y.atan2(x).to_degrees())
}

/// Sampled 1D Gaussian of `len` taps normalized to unit sum.
///
/// Taps are centered on `(len - 1) / 2`.
pub(crate) fn gaussian_kernel(len: usize, sigma: f32) -> Vec<f32> {
    let center = (len as f32 - 1.0) * 0.5;
    let scale = -0.5 / (sigma * sigma);
    let mut taps: Vec<f32> = (0..len)
        .map(|i| {
            let d = i as f32 - center;
            (d * d * scale).exp()
        })
        .collect();
    let sum: f32 = taps.iter().sum();
    if sum > 0.0 {
        for tap in taps.iter_mut() {
            *tap /= sum;
        }
    }
    taps
}
