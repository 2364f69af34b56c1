//! Low-level building blocks for custom matching pipelines.
//!
//! These expose the individual stages behind [`find_match`](crate::find_match)
//! for callers that want to cache features, swap a filter, or render results
//! differently. Most users should prefer `find_match` and `draw`.

pub use crate::draw::{draw_closed_polyline, draw_match_overlay, outline_color, OUTLINE_COLORS};
pub use crate::features::SurfDetector;
pub use crate::homography::{estimate_homography, HomographyEstimate};
pub use crate::image::IntegralImage;
pub use crate::matching::{vote_for_size_and_orientation, vote_for_uniqueness, KnnMatcher};
