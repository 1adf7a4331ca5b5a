//! Neighbor discovery: the directed links within radio range of a shard.

use super::kdtree::{KdEntry, KdTree};
use super::node_table::NodeTable;
use super::partition::IndexShard;
use super::types::NeighborPair;

/// Spatial index over every node in `table`, not just one shard, carrying
/// node IDs.
pub fn build_index(table: &NodeTable) -> KdTree<u32> {
    KdTree::build(table.iter().map(|node| KdEntry::new(node.position().coordinates(), node.id)))
}

/// Pairs `(n, m)` for every node `n` in `shard` and every other indexed node
/// `m` within `n`'s range. `m` may lie outside the shard.
///
/// Results are ordered by source, then neighbor ID.
pub fn discover_neighbors(table: &NodeTable, index: &KdTree<u32>, shard: IndexShard) -> Vec<NeighborPair> {
    let mut pairs = Vec::new();
    for id in shard.ids() {
        let Some(node) = table.get(id as u32) else {
            break;
        };
        let mut found: Vec<u32> = index
            .query_ball(&node.position().coordinates(), node.range)
            .into_iter()
            .map(|entry| entry.data)
            .filter(|&other| other != node.id)
            .collect();
        found.sort_unstable();
        pairs.extend(found.into_iter().map(|neighbor| NeighborPair { source: node.id, neighbor }));
    }
    pairs
}
