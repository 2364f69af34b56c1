//! The detection, matching, voting and estimation sequence.

use crate::features::{Features, SurfDetector};
use crate::homography::estimate_homography;
use crate::image::ImageView;
use crate::matching::{
    vote_for_size_and_orientation, vote_for_uniqueness, KnnMatcher, MatchMask,
};
use crate::search::{MatchConfig, MatchOutput};
use crate::trace::{trace_event, trace_span};
use crate::util::SurfMatchResult;
use std::time::Instant;

/// Matches observed images against one precomputed model.
pub struct ModelMatcher {
    detector: SurfDetector,
    model: Features,
    cfg: MatchConfig,
}

impl ModelMatcher {
    /// Detects and describes the model with the default configuration.
    pub fn new(model: ImageView<'_, u8>) -> SurfMatchResult<Self> {
        Self::with_config(model, MatchConfig::default())
    }

    /// Detects and describes the model with `cfg`.
    pub fn with_config(model: ImageView<'_, u8>, cfg: MatchConfig) -> SurfMatchResult<Self> {
        cfg.validate()?;
        let detector = SurfDetector::new(cfg.surf.clone())?.with_parallel(cfg.parallel);
        let model = detector.detect_and_compute(model);
        Ok(Self {
            detector,
            model,
            cfg,
        })
    }

    /// Model keypoints and descriptors.
    pub fn model_features(&self) -> &Features {
        &self.model
    }

    /// Active configuration.
    pub fn config(&self) -> &MatchConfig {
        &self.cfg
    }

    /// Locates the model in `observed`.
    ///
    /// Too few surviving matches is not an error: the output simply has no
    /// homography.
    pub fn match_observed(&self, observed: ImageView<'_, u8>) -> SurfMatchResult<MatchOutput> {
        let _span = trace_span!("find_match", model_keypoints = self.model.len()).entered();
        let cfg = &self.cfg;
        let watch = Instant::now();

        let observed_features = self.detector.detect_and_compute(observed);
        let matches = KnnMatcher::from_features(&self.model)
            .with_parallel(cfg.parallel)
            .knn_match(&observed_features.descriptors)?;

        let mut mask = MatchMask::accept_all(matches.len());
        let mut accepted =
            vote_for_uniqueness(&matches, cfg.vote.uniqueness_threshold, &mut mask);

        let mut homography = None;
        if accepted >= cfg.min_matches {
            accepted = vote_for_size_and_orientation(
                &self.model.keypoints,
                &observed_features.keypoints,
                &matches,
                &mut mask,
                cfg.vote.scale_increment,
                cfg.vote.rotation_bins,
            );
            if accepted >= cfg.min_matches {
                let pairs: Vec<(usize, (f32, f32), (f32, f32))> = mask
                    .accepted_rows()
                    .filter_map(|row| {
                        let best = matches.best(row)?;
                        let m = self.model.keypoints.get(best.index)?;
                        let o = observed_features.keypoints.get(row)?;
                        Some((row, (m.x, m.y), (o.x, o.y)))
                    })
                    .collect();
                let rows: Vec<usize> = pairs.iter().map(|p| p.0).collect();
                let src: Vec<(f32, f32)> = pairs.iter().map(|p| p.1).collect();
                let dst: Vec<(f32, f32)> = pairs.iter().map(|p| p.2).collect();
                if let Some(estimate) = estimate_homography(&src, &dst, &cfg.ransac) {
                    for (&row, &inlier) in rows.iter().zip(estimate.inliers.iter()) {
                        if !inlier {
                            mask.reject(row);
                        }
                    }
                    let inliers = estimate.inlier_count();
                    if inliers >= cfg.min_matches && estimate.homography.is_well_conditioned() {
                        homography = Some(estimate.homography);
                    }
                }
            }
        }

        let match_time = watch.elapsed();
        trace_event!(
            "find_match_done",
            observed_keypoints = observed_features.len(),
            accepted = mask.count_accepted(),
            found = homography.is_some(),
            micros = match_time.as_micros() as u64
        );

        Ok(MatchOutput {
            model_keypoints: self.model.keypoints.clone(),
            observed_keypoints: observed_features.keypoints,
            matches,
            mask,
            homography,
            match_time,
        })
    }
}

/// Locates `model` in `observed` with the default configuration.
pub fn find_match(
    model: ImageView<'_, u8>,
    observed: ImageView<'_, u8>,
) -> SurfMatchResult<MatchOutput> {
    find_match_with_config(model, observed, MatchConfig::default())
}

/// Locates `model` in `observed`.
///
/// Model feature extraction is excluded from `match_time`.
pub fn find_match_with_config(
    model: ImageView<'_, u8>,
    observed: ImageView<'_, u8>,
    cfg: MatchConfig,
) -> SurfMatchResult<MatchOutput> {
    ModelMatcher::with_config(model, cfg)?.match_observed(observed)
}
