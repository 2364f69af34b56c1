//! Descriptor matching and match filtering.
//!
//! `KnnMatcher` finds the two nearest model descriptors for every observed
//! descriptor. The result rows line up with the observed keypoints, and a
//! `MatchMask` of the same length records which rows are still trusted
//! after each voting stage.

mod knn;
pub(crate) mod topk;
mod vote;

pub use knn::KnnMatcher;
pub use vote::{vote_for_size_and_orientation, vote_for_uniqueness, VoteConfig};

/// Number of neighbours retrieved per query descriptor.
pub const KNN_K: usize = 2;

/// A candidate model descriptor for one query row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor {
    /// Row index into the model (train) descriptors.
    pub index: usize,
    /// Euclidean distance between the two descriptors.
    pub distance: f32,
}

/// k = 2 nearest-neighbour table, one row per observed keypoint.
///
/// Columns are sorted by ascending distance. A column is `None` only when
/// the model has fewer than two descriptors.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KnnMatches {
    rows: Vec<[Option<Neighbor>; KNN_K]>,
}

impl KnnMatches {
    /// Builds a table from explicit rows.
    pub fn from_rows(rows: Vec<[Option<Neighbor>; KNN_K]>) -> Self {
        Self { rows }
    }

    /// Number of rows (observed keypoints).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` when there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of columns, always [`KNN_K`].
    pub fn cols(&self) -> usize {
        KNN_K
    }

    /// Returns both candidates of row `row`.
    pub fn row(&self, row: usize) -> Option<&[Option<Neighbor>; KNN_K]> {
        self.rows.get(row)
    }

    /// Closest candidate of row `row`.
    pub fn best(&self, row: usize) -> Option<Neighbor> {
        self.rows.get(row).and_then(|r| r[0])
    }

    /// Model indices of row `row`.
    pub fn indices(&self, row: usize) -> [Option<usize>; KNN_K] {
        match self.rows.get(row) {
            Some(r) => [r[0].map(|n| n.index), r[1].map(|n| n.index)],
            None => [None; KNN_K],
        }
    }

    /// Distances of row `row`; missing candidates are infinitely far.
    pub fn distances(&self, row: usize) -> [f32; KNN_K] {
        let dist = |n: Option<Neighbor>| n.map_or(f32::INFINITY, |n| n.distance);
        match self.rows.get(row) {
            Some(r) => [dist(r[0]), dist(r[1])],
            None => [f32::INFINITY; KNN_K],
        }
    }

    /// Iterates over all rows in observed-keypoint order.
    pub fn iter(&self) -> impl Iterator<Item = &[Option<Neighbor>; KNN_K]> + '_ {
        self.rows.iter()
    }
}

/// Per-row acceptance flags, mutated in place by the filtering stages.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchMask {
    flags: Vec<bool>,
}

impl MatchMask {
    /// Creates a mask with every row accepted.
    pub fn accept_all(len: usize) -> Self {
        Self {
            flags: vec![true; len],
        }
    }

    /// Creates a mask from explicit flags.
    pub fn from_flags(flags: Vec<bool>) -> Self {
        Self { flags }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Returns `true` when there are no rows.
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Returns whether row `row` is accepted; out-of-range rows are not.
    pub fn is_accepted(&self, row: usize) -> bool {
        self.flags.get(row).copied().unwrap_or(false)
    }

    /// Rejects row `row`.
    pub fn reject(&mut self, row: usize) {
        if let Some(flag) = self.flags.get_mut(row) {
            *flag = false;
        }
    }

    /// Number of accepted rows.
    pub fn count_accepted(&self) -> usize {
        self.flags.iter().filter(|&&f| f).count()
    }

    /// Indices of accepted rows in ascending order.
    pub fn accepted_rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.flags
            .iter()
            .enumerate()
            .filter_map(|(i, &f)| f.then_some(i))
    }

    /// The raw flags.
    pub fn as_slice(&self) -> &[bool] {
        &self.flags
    }
}

#[cfg(test)]
mod tests {
    use super::{KnnMatches, MatchMask, Neighbor};

    #[test]
    fn mask_tracks_rejections() {
        let mut mask = MatchMask::accept_all(4);
        mask.reject(1);
        mask.reject(9);
        assert_eq!(mask.count_accepted(), 3);
        assert!(!mask.is_accepted(1));
        assert!(!mask.is_accepted(9));
        assert_eq!(mask.accepted_rows().collect::<Vec<_>>(), vec![0, 2, 3]);
    }

    #[test]
    fn missing_neighbours_are_infinitely_far() {
        let matches = KnnMatches::from_rows(vec![[
            Some(Neighbor {
                index: 3,
                distance: 0.25,
            }),
            None,
        ]]);
        assert_eq!(matches.indices(0), [Some(3), None]);
        assert_eq!(matches.distances(0)[0], 0.25);
        assert!(matches.distances(0)[1].is_infinite());
        assert_eq!(matches.cols(), 2);
    }
}
