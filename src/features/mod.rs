//! SURF keypoint detection and description.
//!
//! Detection runs a fast-Hessian scale space over an integral image: box
//! filter approximations of the second derivatives are evaluated for
//! growing filter sizes, local maxima of the Hessian determinant above the
//! threshold become keypoints, and a quadratic fit refines their position
//! and size. Each keypoint then gets a dominant orientation from Haar
//! wavelet responses and a 64-element descriptor sampled in its rotated
//! frame.

mod descriptor;
mod hessian;
mod orientation;

use crate::image::{ImageView, IntegralImage};
use crate::trace::{trace_event, trace_span};
use crate::util::{SurfMatchError, SurfMatchResult};
use descriptor::DescriptorSampler;
use orientation::OrientationSampler;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Number of elements in a SURF descriptor row.
pub const DESCRIPTOR_SIZE: usize = 64;

/// A detected interest point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyPoint {
    /// X coordinate (column) in pixels.
    pub x: f32,
    /// Y coordinate (row) in pixels.
    pub y: f32,
    /// Diameter of the box filter that detected the point.
    pub size: f32,
    /// Dominant orientation in degrees within [0, 360), measured clockwise
    /// from the +x axis in image coordinates.
    pub angle: f32,
    /// Hessian determinant at the detection.
    pub response: f32,
    /// Octave the point was found in.
    pub octave: usize,
    /// Sign of the Hessian trace (bright or dark blob).
    pub laplacian: i8,
}

/// Row-major descriptor matrix with one row per keypoint.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Descriptors {
    data: Vec<f32>,
    cols: usize,
}

impl Descriptors {
    /// Creates an empty matrix whose rows have `cols` elements.
    pub fn new(cols: usize) -> Self {
        Self {
            data: Vec::new(),
            cols,
        }
    }

    /// Builds a matrix from a flat row-major buffer.
    pub fn from_vec(data: Vec<f32>, cols: usize) -> SurfMatchResult<Self> {
        if cols == 0 {
            return Err(SurfMatchError::InvalidDimensions {
                width: cols,
                height: data.len(),
            });
        }
        if data.len() % cols != 0 {
            return Err(SurfMatchError::DescriptorSizeMismatch {
                expected: cols,
                got: data.len() % cols,
            });
        }
        Ok(Self { data, cols })
    }

    /// Appends one row.
    pub fn push_row(&mut self, row: &[f32]) -> SurfMatchResult<()> {
        if row.len() != self.cols {
            return Err(SurfMatchError::DescriptorSizeMismatch {
                expected: self.cols,
                got: row.len(),
            });
        }
        self.data.extend_from_slice(row);
        Ok(())
    }

    /// Number of rows (keypoints).
    pub fn rows(&self) -> usize {
        if self.cols == 0 {
            0
        } else {
            self.data.len() / self.cols
        }
    }

    /// Number of elements per row.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns `true` when the matrix has no rows.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns row `idx`, if present.
    pub fn row(&self, idx: usize) -> Option<&[f32]> {
        let start = idx.checked_mul(self.cols)?;
        self.data.get(start..start + self.cols)
    }

    /// Iterates over all rows in order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        self.data.chunks_exact(self.cols.max(1))
    }
}

/// Parameters of the SURF detector.
#[derive(Clone, Debug)]
pub struct SurfConfig {
    /// Minimum Hessian determinant for a keypoint.
    pub hessian_threshold: f32,
    /// Number of octaves in the scale space.
    pub octaves: usize,
    /// Layers per octave at which maxima are searched.
    pub octave_layers: usize,
    /// Skip orientation assignment and describe in the image frame.
    pub upright: bool,
}

impl Default for SurfConfig {
    fn default() -> Self {
        Self {
            hessian_threshold: 500.0,
            octaves: 4,
            octave_layers: 2,
            upright: false,
        }
    }
}

impl SurfConfig {
    /// Checks that the parameters describe a usable scale space.
    pub fn validate(&self) -> SurfMatchResult<()> {
        if !self.hessian_threshold.is_finite() || self.hessian_threshold < 0.0 {
            return Err(SurfMatchError::InvalidConfig(
                "hessian_threshold must be finite and non-negative",
            ));
        }
        if self.octaves == 0 || self.octaves > 8 {
            return Err(SurfMatchError::InvalidConfig("octaves must be in 1..=8"));
        }
        if self.octave_layers == 0 {
            return Err(SurfMatchError::InvalidConfig(
                "octave_layers must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Keypoints of one image with their descriptors; row `i` of
/// `descriptors` describes `keypoints[i]`.
#[derive(Clone, Debug, Default)]
pub struct Features {
    pub keypoints: Vec<KeyPoint>,
    pub descriptors: Descriptors,
}

impl Features {
    /// Number of keypoints.
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    /// Returns `true` when nothing was detected.
    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// SURF detector and descriptor extractor.
pub struct SurfDetector {
    cfg: SurfConfig,
    parallel: bool,
    orientation: OrientationSampler,
    descriptor: DescriptorSampler,
}

impl SurfDetector {
    /// Creates a detector after validating `cfg`.
    pub fn new(cfg: SurfConfig) -> SurfMatchResult<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            parallel: false,
            orientation: OrientationSampler::new(),
            descriptor: DescriptorSampler::new(),
        })
    }

    /// Enables row-parallel evaluation when the `rayon` feature is on.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Returns the detector configuration.
    pub fn config(&self) -> &SurfConfig {
        &self.cfg
    }

    /// Detects oriented keypoints without computing descriptors.
    pub fn detect(&self, image: ImageView<'_, u8>) -> Vec<KeyPoint> {
        let integral = IntegralImage::new(image);
        self.detect_integral(&integral)
    }

    fn detect_integral(&self, integral: &IntegralImage) -> Vec<KeyPoint> {
        let candidates = hessian::detect(integral, &self.cfg, self.parallel);
        let candidate_count = candidates.len();
        let keypoints: Vec<KeyPoint> = if self.cfg.upright {
            candidates
                .into_iter()
                .map(|kp| KeyPoint { angle: 0.0, ..kp })
                .collect()
        } else {
            candidates
                .into_iter()
                .filter_map(|kp| {
                    self.orientation
                        .dominant_angle(integral, &kp)
                        .map(|angle| KeyPoint { angle, ..kp })
                })
                .collect()
        };
        trace_event!(
            "surf_keypoints",
            candidates = candidate_count,
            oriented = keypoints.len()
        );
        keypoints
    }

    /// Detects keypoints and computes one descriptor row per keypoint.
    pub fn detect_and_compute(&self, image: ImageView<'_, u8>) -> Features {
        let _span = trace_span!(
            "surf_detect",
            width = image.width(),
            height = image.height()
        )
        .entered();

        let integral = IntegralImage::new(image);
        let keypoints = self.detect_integral(&integral);
        let rows = self.describe(image, &keypoints);

        let mut data = Vec::with_capacity(rows.len() * DESCRIPTOR_SIZE);
        for row in rows.iter() {
            data.extend_from_slice(row);
        }
        Features {
            keypoints,
            descriptors: Descriptors {
                data,
                cols: DESCRIPTOR_SIZE,
            },
        }
    }

    fn describe(
        &self,
        image: ImageView<'_, u8>,
        keypoints: &[KeyPoint],
    ) -> Vec<[f32; DESCRIPTOR_SIZE]> {
        #[cfg(feature = "rayon")]
        if self.parallel {
            return keypoints
                .par_iter()
                .map(|kp| self.descriptor.compute(image, kp))
                .collect();
        }
        keypoints
            .iter()
            .map(|kp| self.descriptor.compute(image, kp))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Descriptors, SurfConfig};
    use crate::SurfMatchError;

    #[test]
    fn descriptors_reject_ragged_rows() {
        let mut desc = Descriptors::new(3);
        desc.push_row(&[1.0, 2.0, 3.0]).unwrap();
        let err = desc.push_row(&[1.0]).unwrap_err();
        assert_eq!(
            err,
            SurfMatchError::DescriptorSizeMismatch {
                expected: 3,
                got: 1
            }
        );
        assert_eq!(desc.rows(), 1);
        assert_eq!(desc.row(0), Some(&[1.0, 2.0, 3.0][..]));
        assert!(desc.row(1).is_none());
    }

    #[test]
    fn default_config_is_valid() {
        assert!(SurfConfig::default().validate().is_ok());
        let bad = SurfConfig {
            octaves: 0,
            ..SurfConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
