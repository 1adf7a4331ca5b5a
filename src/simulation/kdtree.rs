//! Static k-d tree over 3-D points with radius ("ball") queries.
//!
//! The tree is implicit: entries live in one `Vec`, and every subslice is a
//! subtree whose root is its middle element. Construction partitions each
//! subslice around the median of the axis chosen by depth (x, y, z, x, ...),
//! so the layout is deterministic for a given input order.
//!
//! There is no insertion or deletion. Workers rebuild the tree from each
//! snapshot.

use std::cmp::Ordering;

use super::geometry::{BoundingBox, distance2};
use super::types::DIMENSIONS;

/// One indexed point and the payload it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct KdEntry<T> {
    pub coordinates: [f64; DIMENSIONS],
    pub data: T,
}

impl<T> KdEntry<T> {
    pub fn new(coordinates: [f64; DIMENSIONS], data: T) -> Self {
        Self { coordinates, data }
    }
}

#[derive(Debug, Clone)]
pub struct KdTree<T> {
    entries: Vec<KdEntry<T>>,
    bounds: Option<BoundingBox>,
}

impl<T> KdTree<T> {
    /// Build a balanced tree in O(n log n).
    ///
    /// An empty input yields an empty tree that answers every query with an
    /// empty result.
    pub fn build(points: impl IntoIterator<Item = KdEntry<T>>) -> Self {
        let mut entries: Vec<KdEntry<T>> = points.into_iter().collect();
        let bounds = BoundingBox::enclosing(entries.iter().map(|e| &e.coordinates));
        arrange(&mut entries, 0);
        Self { entries, bounds }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries within Euclidean distance `radius` (inclusive) of `center`.
    ///
    /// An entry located at `center` is part of the result; callers that need
    /// "other" points must filter it out. Negative or NaN radii match nothing.
    pub fn query_ball(&self, center: &[f64; DIMENSIONS], radius: f64) -> Vec<&KdEntry<T>> {
        let mut matches = Vec::new();
        if radius.is_nan() || radius < 0.0 {
            return matches;
        }
        if let Some(bounds) = self.bounds {
            collect_ball(&self.entries, 0, bounds, center, radius * radius, &mut matches);
        }
        matches
    }
}

fn axis_order<T>(axis: usize) -> impl FnMut(&KdEntry<T>, &KdEntry<T>) -> Ordering {
    move |a, b| a.coordinates[axis].total_cmp(&b.coordinates[axis])
}

/// Reorder `slice` in place so that its middle element is the median on the
/// depth's axis, with smaller-or-equal entries before it and larger-or-equal
/// after it, then recurse into both halves.
fn arrange<T>(slice: &mut [KdEntry<T>], depth: usize) {
    if slice.len() <= 1 {
        return;
    }
    let axis = depth % DIMENSIONS;
    let mid = slice.len() / 2;
    slice.select_nth_unstable_by(mid, axis_order(axis));
    let (left, rest) = slice.split_at_mut(mid);
    arrange(left, depth + 1);
    arrange(&mut rest[1..], depth + 1);
}

fn collect_ball<'a, T>(
    slice: &'a [KdEntry<T>],
    depth: usize,
    bounds: BoundingBox,
    center: &[f64; DIMENSIONS],
    radius2: f64,
    matches: &mut Vec<&'a KdEntry<T>>,
) {
    if slice.is_empty() || bounds.distance2(center) > radius2 {
        return;
    }
    let axis = depth % DIMENSIONS;
    let mid = slice.len() / 2;
    let root = &slice[mid];
    if distance2(&root.coordinates, center) <= radius2 {
        matches.push(root);
    }
    let split = root.coordinates[axis];
    collect_ball(&slice[..mid], depth + 1, bounds.with_max(axis, split), center, radius2, matches);
    collect_ball(&slice[mid + 1..], depth + 1, bounds.with_min(axis, split), center, radius2, matches);
}
