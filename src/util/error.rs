//! Error types for surfmatch.

use thiserror::Error;

/// Result alias for surfmatch operations.
pub type SurfMatchResult<T> = std::result::Result<T, SurfMatchError>;

/// Errors that can occur when detecting, matching or drawing.
///
/// Running out of matches is not an error: the matching stages degrade to
/// "no homography" instead.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SurfMatchError {
    /// Image dimensions are zero or overflow.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// Row stride is smaller than the image width.
    #[error("invalid stride {stride} for width {width}")]
    InvalidStride { width: usize, stride: usize },
    /// Backing buffer is shorter than the described image.
    #[error("buffer too small: needed {needed} elements, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// Region of interest does not fit inside the image.
    #[error("roi out of bounds: ({x},{y}) {width}x{height} in {img_width}x{img_height}")]
    RoiOutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        img_width: usize,
        img_height: usize,
    },
    /// Descriptor rows of different lengths were combined.
    #[error("descriptor size mismatch: expected {expected}, got {got}")]
    DescriptorSizeMismatch { expected: usize, got: usize },
    /// A configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    /// Image decoding or encoding failed.
    #[error("image io: {reason}")]
    ImageIo { reason: String },
}
