//! Locating a model image inside an observed image.
//!
//! [`ModelMatcher`] extracts the model's features once; each call to
//! [`ModelMatcher::match_observed`] then runs detection on the observed
//! image, k = 2 matching, the uniqueness and size/orientation votes, and
//! RANSAC homography estimation. [`find_match`] is the one-shot form.

mod find;

pub use find::{find_match, find_match_with_config, ModelMatcher};

use crate::features::{KeyPoint, SurfConfig};
use crate::homography::{Homography, RansacConfig};
use crate::matching::{KnnMatches, MatchMask, VoteConfig};
use crate::util::{SurfMatchError, SurfMatchResult};
use std::time::Duration;

/// Configuration for the matching pipeline.
#[derive(Clone, Debug)]
pub struct MatchConfig {
    /// Detector parameters, shared by model and observed images.
    pub surf: SurfConfig,
    /// Voting thresholds.
    pub vote: VoteConfig,
    /// Homography estimator parameters.
    pub ransac: RansacConfig,
    /// Accepted matches required before each later stage runs.
    pub min_matches: usize,
    /// Use rayon for detection and matching (requires the `rayon` feature).
    pub parallel: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            surf: SurfConfig::default(),
            vote: VoteConfig::default(),
            ransac: RansacConfig::default(),
            min_matches: 4,
            parallel: false,
        }
    }
}

impl MatchConfig {
    /// Validates every nested configuration.
    pub fn validate(&self) -> SurfMatchResult<()> {
        self.surf.validate()?;
        self.vote.validate()?;
        self.ransac.validate()?;
        if self.min_matches < 4 {
            return Err(SurfMatchError::InvalidConfig(
                "min_matches must be at least 4 to fit a homography",
            ));
        }
        Ok(())
    }
}

/// Everything produced by one model/observed matching run.
#[derive(Clone, Debug)]
pub struct MatchOutput {
    /// Keypoints of the model image (train side).
    pub model_keypoints: Vec<KeyPoint>,
    /// Keypoints of the observed image (query side).
    pub observed_keypoints: Vec<KeyPoint>,
    /// Two nearest model keypoints per observed keypoint.
    pub matches: KnnMatches,
    /// Rows that survived every filter.
    pub mask: MatchMask,
    /// Model-to-observed transform, when enough matches agreed.
    pub homography: Option<Homography>,
    /// Time from observed feature extraction to the end of estimation.
    pub match_time: Duration,
}

impl MatchOutput {
    /// Number of accepted matches.
    pub fn accepted_count(&self) -> usize {
        self.mask.count_accepted()
    }

    /// Accepted `(model, observed)` keypoint pairs in observed order.
    pub fn accepted_pairs(&self) -> impl Iterator<Item = (&KeyPoint, &KeyPoint)> + '_ {
        self.mask.accepted_rows().filter_map(move |row| {
            let best = self.matches.best(row)?;
            Some((
                self.model_keypoints.get(best.index)?,
                self.observed_keypoints.get(row)?,
            ))
        })
    }

    /// Projects the model rectangle `width` x `height` into the observed
    /// image.
    ///
    /// Corners are ordered bottom-left, bottom-right, top-right, top-left.
    pub fn project_model_corners(&self, width: u32, height: u32) -> Option<[(f32, f32); 4]> {
        let h = self.homography.as_ref()?;
        let (w, ht) = (width as f32, height as f32);
        let corners = [(0.0, ht), (w, ht), (w, 0.0), (0.0, 0.0)];
        let projected = h.project_points(&corners)?;
        projected.try_into().ok()
    }
}
