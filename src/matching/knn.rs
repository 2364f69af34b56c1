//! Brute-force L2 k-nearest-neighbour matcher.

use crate::features::Descriptors;
use crate::matching::topk::NearestK;
use crate::matching::{KnnMatches, Neighbor, KNN_K};
use crate::trace::{trace_event, trace_span};
use crate::util::{SurfMatchError, SurfMatchResult};
use crate::Features;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Matches query descriptors against a fixed train set.
pub struct KnnMatcher<'a> {
    train: &'a Descriptors,
    parallel: bool,
}

impl<'a> KnnMatcher<'a> {
    /// Creates a matcher over `train` (the model descriptors).
    pub fn new(train: &'a Descriptors) -> Self {
        Self {
            train,
            parallel: false,
        }
    }

    /// Creates a matcher over the descriptors of `features`.
    pub fn from_features(features: &'a Features) -> Self {
        Self::new(&features.descriptors)
    }

    /// Enables query-parallel matching when the `rayon` feature is on.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Finds the two closest train rows for every query row.
    pub fn knn_match(&self, query: &Descriptors) -> SurfMatchResult<KnnMatches> {
        let _span = trace_span!(
            "knn_match",
            queries = query.rows(),
            train = self.train.rows()
        )
        .entered();

        if !query.is_empty() && !self.train.is_empty() && query.cols() != self.train.cols() {
            return Err(SurfMatchError::DescriptorSizeMismatch {
                expected: self.train.cols(),
                got: query.cols(),
            });
        }

        let matches = KnnMatches::from_rows(self.match_rows(query));
        trace_event!("knn_rows", rows = matches.len());
        Ok(matches)
    }

    fn match_rows(&self, query: &Descriptors) -> Vec<[Option<Neighbor>; KNN_K]> {
        #[cfg(feature = "rayon")]
        if self.parallel {
            let rows: Vec<&[f32]> = query.iter_rows().collect();
            return rows.par_iter().map(|q| self.nearest(q)).collect();
        }
        query.iter_rows().map(|q| self.nearest(q)).collect()
    }

    fn nearest(&self, query: &[f32]) -> [Option<Neighbor>; KNN_K] {
        let mut nearest = NearestK::new(KNN_K);
        for (index, train) in self.train.iter_rows().enumerate() {
            nearest.push(Neighbor {
                index,
                distance: l2_distance(query, train),
            });
        }
        let mut out = [None; KNN_K];
        for (slot, neighbor) in out.iter_mut().zip(nearest.into_sorted_asc()) {
            *slot = Some(neighbor);
        }
        out
    }
}

#[inline]
fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::KnnMatcher;
    use crate::features::Descriptors;
    use crate::SurfMatchError;

    #[test]
    fn finds_two_nearest_in_order() {
        let train =
            Descriptors::from_vec(vec![0.0, 0.0, 10.0, 0.0, 1.0, 0.0, 0.0, 3.0], 2).unwrap();
        let query = Descriptors::from_vec(vec![0.9, 0.0, 9.0, 0.0], 2).unwrap();
        let matches = KnnMatcher::new(&train).knn_match(&query).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches.indices(0), [Some(2), Some(0)]);
        assert_eq!(matches.indices(1), [Some(1), Some(2)]);
        assert!((matches.distances(0)[0] - 0.1).abs() < 1e-6);
        assert!((matches.distances(1)[1] - 8.0).abs() < 1e-6);
    }

    #[test]
    fn single_train_row_leaves_second_column_empty() {
        let train = Descriptors::from_vec(vec![1.0, 1.0], 2).unwrap();
        let query = Descriptors::from_vec(vec![1.0, 0.0], 2).unwrap();
        let matches = KnnMatcher::new(&train).knn_match(&query).unwrap();
        assert_eq!(matches.indices(0), [Some(0), None]);
    }

    #[test]
    fn empty_train_yields_empty_rows() {
        let train = Descriptors::new(2);
        let query = Descriptors::from_vec(vec![1.0, 0.0, 0.0, 1.0], 2).unwrap();
        let matches = KnnMatcher::new(&train).knn_match(&query).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches.indices(1), [None, None]);
    }

    #[test]
    fn mismatched_widths_are_rejected() {
        let train = Descriptors::from_vec(vec![1.0, 1.0, 1.0], 3).unwrap();
        let query = Descriptors::from_vec(vec![1.0, 0.0], 2).unwrap();
        let err = KnnMatcher::new(&train).knn_match(&query).unwrap_err();
        assert_eq!(
            err,
            SurfMatchError::DescriptorSizeMismatch {
                expected: 3,
                got: 2
            }
        );
    }
}
