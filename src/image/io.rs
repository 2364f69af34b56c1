//! Convenience helpers for reading and writing images via the `image` crate.
//!
//! Available when the `image-io` feature is enabled.

use crate::util::{SurfMatchError, SurfMatchResult};
use ::image::{DynamicImage, GrayImage, RgbImage};
use std::path::Path;

fn open<P: AsRef<Path>>(path: P) -> SurfMatchResult<DynamicImage> {
    ::image::open(path).map_err(|err| SurfMatchError::ImageIo {
        reason: err.to_string(),
    })
}

/// Loads an image from disk and converts it to 8-bit RGB.
pub fn load_rgb_image<P: AsRef<Path>>(path: P) -> SurfMatchResult<RgbImage> {
    Ok(open(path)?.to_rgb8())
}

/// Loads an image from disk and converts it to 8-bit grayscale.
pub fn load_gray_image<P: AsRef<Path>>(path: P) -> SurfMatchResult<GrayImage> {
    Ok(open(path)?.to_luma8())
}

/// Writes an RGB image; the format follows the file extension.
pub fn save_rgb_image<P: AsRef<Path>>(img: &RgbImage, path: P) -> SurfMatchResult<()> {
    img.save(path).map_err(|err| SurfMatchError::ImageIo {
        reason: err.to_string(),
    })
}
