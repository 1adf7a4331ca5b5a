//! Geometry helpers for range checks in 3-D.
//!
//! Contains helper functions for:
//! - Point-to-point distance (squared, to avoid sqrt in hot paths)
//! - Point-to-box distance used for subtree pruning in the spatial index
//! - Bounding boxes over point sets

use super::types::DIMENSIONS;

/// Axis-aligned box given by its minimum and maximum corners (inclusive).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: [f64; DIMENSIONS],
    pub max: [f64; DIMENSIONS],
}

impl BoundingBox {
    /// Smallest box containing every point, or `None` for an empty set.
    pub fn enclosing<'a>(points: impl IntoIterator<Item = &'a [f64; DIMENSIONS]>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut bounds = BoundingBox { min: *first, max: *first };
        for p in points {
            for axis in 0..DIMENSIONS {
                bounds.min[axis] = bounds.min[axis].min(p[axis]);
                bounds.max[axis] = bounds.max[axis].max(p[axis]);
            }
        }
        Some(bounds)
    }

    /// Copy of this box with the upper bound on `axis` lowered to `value`.
    pub fn with_max(&self, axis: usize, value: f64) -> Self {
        let mut b = *self;
        b.max[axis] = value;
        b
    }

    /// Copy of this box with the lower bound on `axis` raised to `value`.
    pub fn with_min(&self, axis: usize, value: f64) -> Self {
        let mut b = *self;
        b.min[axis] = value;
        b
    }

    /// Squared distance from `p` to the closest point of the box; zero when
    /// `p` lies inside.
    pub fn distance2(&self, p: &[f64; DIMENSIONS]) -> f64 {
        let mut d2 = 0.0;
        for axis in 0..DIMENSIONS {
            let d = if p[axis] < self.min[axis] {
                self.min[axis] - p[axis]
            } else if p[axis] > self.max[axis] {
                p[axis] - self.max[axis]
            } else {
                0.0
            };
            d2 += d * d;
        }
        d2
    }
}

/// Squared Euclidean distance between two points.
///
/// Range checks compare d² against r², so no square root is needed.
pub fn distance2(a: &[f64; DIMENSIONS], b: &[f64; DIMENSIONS]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}
