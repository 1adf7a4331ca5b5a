//! Partition planner: which node IDs a worker runs discovery for.
//!
//! Every worker holds the full snapshot; shards only split the computation.
//! Each worker computes its own shard locally from `(node_count,
//! worker_count, worker_index)`; no plan is exchanged.

use std::ops::Range;

use crate::error::PlanError;

/// Half-open range `[start, end)` of node IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexShard {
    pub start: usize,
    pub end: usize,
}

impl IndexShard {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[cfg(test)]
    pub fn contains(&self, id: u32) -> bool {
        (self.start..self.end).contains(&(id as usize))
    }

    pub fn ids(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl std::fmt::Display for IndexShard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Shard for `worker_index` out of `worker_count`.
///
/// Shards are `node_count / worker_count` wide and the last one also takes
/// the remainder, so the shards of indices `0..worker_count` are contiguous,
/// disjoint, and cover `[0, node_count)` exactly.
pub fn plan(node_count: usize, worker_count: usize, worker_index: usize) -> Result<IndexShard, PlanError> {
    if worker_count == 0 {
        return Err(PlanError::NoWorkers);
    }
    if worker_index >= worker_count {
        return Err(PlanError::WorkerIndexOutOfRange {
            index: worker_index,
            count: worker_count,
        });
    }
    let size = node_count / worker_count;
    let start = worker_index * size;
    let end = if worker_index + 1 == worker_count { node_count } else { start + size };
    Ok(IndexShard { start, end })
}
