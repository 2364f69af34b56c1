//! SurfMatch locates planar model images inside an observed image.
//!
//! Both images are reduced to SURF keypoints and 64-dimensional descriptors,
//! matched with a brute-force two-nearest-neighbour search, filtered by a
//! uniqueness vote and a size/orientation vote, and the surviving pairs are
//! fed to a seeded RANSAC homography estimator. Optional parallelism is
//! available via the `rayon` feature.

pub mod draw;
pub mod features;
pub mod homography;
pub mod image;
pub mod lowlevel;
pub mod matching;
pub mod search;
mod trace;
pub mod util;

#[cfg(feature = "image-io")]
pub use crate::image::io;

pub use draw::{
    draw, draw_matches_side_by_side, draw_regions_with_config, draw_with_config, DrawConfig,
    Drawing, ModelRegion, ModelReport,
};
pub use features::{Descriptors, Features, KeyPoint, SurfConfig, SurfDetector, DESCRIPTOR_SIZE};
pub use homography::{estimate_homography, Homography, HomographyEstimate, RansacConfig};
pub use crate::image::{view_from_gray_image, ImageView, IntegralImage};
pub use matching::{KnnMatcher, KnnMatches, MatchMask, Neighbor, VoteConfig, KNN_K};
pub use search::{find_match, find_match_with_config, MatchConfig, MatchOutput, ModelMatcher};
pub use util::{SurfMatchError, SurfMatchResult};
