//! Voting filters that prune ambiguous or inconsistent matches.
//!
//! Both filters only ever clear mask entries; rows already rejected stay
//! rejected.

use crate::features::KeyPoint;
use crate::matching::{KnnMatches, MatchMask};
use crate::trace::{trace_event, trace_span};
use crate::util::math::wrap_360;
use crate::util::{SurfMatchError, SurfMatchResult};

/// Thresholds of the two voting stages.
#[derive(Clone, Debug)]
pub struct VoteConfig {
    /// Maximum ratio of best to second-best distance.
    pub uniqueness_threshold: f32,
    /// Width of a scale bin as a ratio between keypoint sizes.
    pub scale_increment: f32,
    /// Number of bins covering the full 360 degrees of relative rotation.
    pub rotation_bins: usize,
}

impl Default for VoteConfig {
    fn default() -> Self {
        Self {
            uniqueness_threshold: 0.8,
            scale_increment: 1.5,
            rotation_bins: 20,
        }
    }
}

impl VoteConfig {
    /// Checks that the thresholds are usable.
    pub fn validate(&self) -> SurfMatchResult<()> {
        if !(self.uniqueness_threshold > 0.0 && self.uniqueness_threshold <= 1.0) {
            return Err(SurfMatchError::InvalidConfig(
                "uniqueness_threshold must be in (0, 1]",
            ));
        }
        if !(self.scale_increment > 1.0 && self.scale_increment.is_finite()) {
            return Err(SurfMatchError::InvalidConfig(
                "scale_increment must be greater than 1",
            ));
        }
        if self.rotation_bins == 0 {
            return Err(SurfMatchError::InvalidConfig(
                "rotation_bins must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Rejects rows whose best distance is not clearly below the second best.
///
/// A row survives when `d0 / d1 <= threshold`. A zero divisor gives ratio
/// 0, so exact duplicates survive, as do rows without a second candidate.
/// Rows without any candidate are rejected. Returns the number of accepted
/// rows.
pub fn vote_for_uniqueness(matches: &KnnMatches, threshold: f32, mask: &mut MatchMask) -> usize {
    for row in 0..mask.len() {
        if !mask.is_accepted(row) {
            continue;
        }
        let [d0, d1] = matches.distances(row);
        let ratio = if d1 == 0.0 { 0.0 } else { d0 / d1 };
        // inf / inf is NaN, which compares false and is rejected.
        if !(ratio <= threshold) {
            mask.reject(row);
        }
    }
    let accepted = mask.count_accepted();
    trace_event!("uniqueness_vote", accepted = accepted);
    accepted
}

/// Keeps the rows that agree with the dominant relative scale and rotation.
///
/// Each accepted row votes into a 2D histogram over
/// `log10(observed.size / model.size)` (bins of `log10(scale_increment)`)
/// and `(observed.angle - model.angle) mod 360` (`rotation_bins` bins).
/// Bins holding at most half of the peak count are discarded, and rows
/// that voted for them are rejected. Returns the number of accepted rows.
pub fn vote_for_size_and_orientation(
    model_keypoints: &[KeyPoint],
    observed_keypoints: &[KeyPoint],
    matches: &KnnMatches,
    mask: &mut MatchMask,
    scale_increment: f32,
    rotation_bins: usize,
) -> usize {
    let _span = trace_span!("vote_size_orientation", rows = mask.len()).entered();

    let mut votes: Vec<(usize, f32, f32)> = Vec::new();
    for row in mask.accepted_rows().collect::<Vec<_>>() {
        let pair = matches
            .best(row)
            .and_then(|best| model_keypoints.get(best.index))
            .zip(observed_keypoints.get(row));
        let Some((model, observed)) = pair else {
            mask.reject(row);
            continue;
        };
        let log_scale = (observed.size / model.size).log10();
        if !log_scale.is_finite() {
            mask.reject(row);
            continue;
        }
        let rotation = wrap_360(observed.angle - model.angle);
        votes.push((row, log_scale, rotation));
    }
    if votes.is_empty() || rotation_bins == 0 {
        return mask.count_accepted();
    }

    let (min_s, max_s) = votes
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &(_, s, _)| {
            (lo.min(s), hi.max(s))
        });
    let step = scale_increment.log10();
    let scale_bins = (((max_s - min_s) / step).ceil() as usize).max(2);
    let rotation_step = 360.0 / rotation_bins as f32;

    let bin_of = |s: f32, r: f32| -> usize {
        let sb = (((s - min_s) / step) as usize).min(scale_bins - 1);
        let rb = ((r / rotation_step) as usize).min(rotation_bins - 1);
        sb * rotation_bins + rb
    };

    let mut hist = vec![0usize; scale_bins * rotation_bins];
    for &(_, s, r) in votes.iter() {
        hist[bin_of(s, r)] += 1;
    }
    let peak = hist.iter().copied().max().unwrap_or(0);
    let cutoff = peak as f32 * 0.5;

    for &(row, s, r) in votes.iter() {
        let count = hist[bin_of(s, r)];
        if (count as f32) <= cutoff {
            mask.reject(row);
        }
    }

    let accepted = mask.count_accepted();
    trace_event!(
        "size_orientation_vote",
        scale_bins = scale_bins,
        peak = peak,
        accepted = accepted
    );
    accepted
}

#[cfg(test)]
mod tests {
    use super::{vote_for_size_and_orientation, vote_for_uniqueness, VoteConfig};
    use crate::features::KeyPoint;
    use crate::matching::{KnnMatches, MatchMask, Neighbor};

    fn row(i0: usize, d0: f32, i1: usize, d1: f32) -> [Option<Neighbor>; 2] {
        [
            Some(Neighbor {
                index: i0,
                distance: d0,
            }),
            Some(Neighbor {
                index: i1,
                distance: d1,
            }),
        ]
    }

    fn kp(size: f32, angle: f32) -> KeyPoint {
        KeyPoint {
            x: 0.0,
            y: 0.0,
            size,
            angle,
            response: 1.0,
            octave: 0,
            laplacian: 1,
        }
    }

    #[test]
    fn uniqueness_uses_ratio_threshold() {
        let matches = KnnMatches::from_rows(vec![
            row(0, 0.1, 1, 0.5),
            row(0, 0.45, 1, 0.5),
            row(0, 0.4, 1, 0.5),
            row(0, 0.0, 1, 0.0),
            [
                Some(Neighbor {
                    index: 0,
                    distance: 0.3,
                }),
                None,
            ],
            [None, None],
        ]);
        let mut mask = MatchMask::accept_all(6);
        let accepted = vote_for_uniqueness(&matches, 0.8, &mut mask);
        assert_eq!(accepted, 4);
        assert_eq!(mask.as_slice(), &[true, false, true, true, true, false][..]);
    }

    #[test]
    fn uniqueness_keeps_prior_rejections() {
        let matches = KnnMatches::from_rows(vec![row(0, 0.1, 1, 0.5)]);
        let mut mask = MatchMask::from_flags(vec![false]);
        assert_eq!(vote_for_uniqueness(&matches, 0.8, &mut mask), 0);
    }

    #[test]
    fn size_orientation_rejects_outliers() {
        let model: Vec<KeyPoint> = (0..6).map(|_| kp(10.0, 10.0)).collect();
        let mut observed: Vec<KeyPoint> = (0..5).map(|_| kp(20.0, 40.0)).collect();
        // Inconsistent rotation.
        observed.push(kp(20.0, 200.0));
        // Inconsistent scale.
        observed.push(kp(200.0, 40.0));
        let rows = (0..7).map(|i| row(i.min(5), 0.1, 0, 0.9)).collect();
        let matches = KnnMatches::from_rows(rows);
        let mut mask = MatchMask::accept_all(7);

        let accepted =
            vote_for_size_and_orientation(&model, &observed, &matches, &mut mask, 1.5, 20);
        assert_eq!(accepted, 5);
        assert!(!mask.is_accepted(5));
        assert!(!mask.is_accepted(6));
    }

    #[test]
    fn rotation_difference_is_taken_mod_360() {
        let model: Vec<KeyPoint> = vec![kp(10.0, 350.0), kp(10.0, 5.0)];
        let observed: Vec<KeyPoint> = vec![kp(10.0, 355.0), kp(10.0, 10.0), kp(10.0, 3.0)];
        let matches = KnnMatches::from_rows(vec![
            row(0, 0.1, 1, 0.9),
            row(1, 0.1, 0, 0.9),
            row(1, 0.1, 0, 0.9),
        ]);
        let mut mask = MatchMask::accept_all(3);
        let accepted =
            vote_for_size_and_orientation(&model, &observed, &matches, &mut mask, 1.5, 20);
        // Two rows rotate by +5 degrees, one by -2 (358).
        assert_eq!(accepted, 2);
        assert!(!mask.is_accepted(2));
    }

    #[test]
    fn default_vote_config_is_valid() {
        assert!(VoteConfig::default().validate().is_ok());
        let bad = VoteConfig {
            scale_increment: 1.0,
            ..VoteConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
