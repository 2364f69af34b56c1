//! Bounded nearest-neighbour collection.

use crate::matching::Neighbor;
use std::cmp::Ordering;

fn neighbor_cmp_asc(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.index.cmp(&b.index))
}

/// Keeps the `k` closest neighbours seen so far with O(k) insertion cost.
///
/// Ties on distance resolve to the lower train index, so results do not
/// depend on evaluation order.
pub(crate) struct NearestK {
    k: usize,
    items: Vec<Neighbor>,
}

impl NearestK {
    pub(crate) fn new(k: usize) -> Self {
        Self {
            k,
            items: Vec::with_capacity(k),
        }
    }

    /// Offers a candidate, evicting the farthest one when full.
    pub(crate) fn push(&mut self, candidate: Neighbor) {
        if self.k == 0 {
            return;
        }
        if self.items.len() < self.k {
            self.items.push(candidate);
            return;
        }

        let mut worst_idx = 0usize;
        for (idx, item) in self.items.iter().enumerate().skip(1) {
            if neighbor_cmp_asc(item, &self.items[worst_idx]) == Ordering::Greater {
                worst_idx = idx;
            }
        }
        if neighbor_cmp_asc(&candidate, &self.items[worst_idx]) == Ordering::Less {
            self.items[worst_idx] = candidate;
        }
    }

    /// Returns neighbours sorted by ascending distance.
    pub(crate) fn into_sorted_asc(mut self) -> Vec<Neighbor> {
        self.items.sort_by(neighbor_cmp_asc);
        self.items
    }
}
