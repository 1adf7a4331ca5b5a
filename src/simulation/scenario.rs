//! Initial node placement.
//!
//! The controller and every worker build their table independently, so the
//! scenario is a pure function of the configuration and its seed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::NodeDefaults;
use crate::error::TableError;

use super::node_table::NodeTable;
use super::types::{MobilityState, Position, SimNode};

/// Build `node_count` nodes with IDs `0..node_count`, each at a uniformly
/// random point of the spawn box and otherwise identical to `defaults`.
pub fn generate_nodes(node_count: usize, defaults: &NodeDefaults, seed: u64) -> Result<NodeTable, TableError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let size = defaults.spawn_box_size;
    let mut coordinate = || if size > 0.0 { rng.gen_range(0.0..size) } else { 0.0 };

    let nodes = (0..node_count)
        .map(|i| {
            let pos = Position::new(coordinate(), coordinate(), coordinate());
            SimNode {
                id: i as u32,
                mobility: MobilityState {
                    pos,
                    time: defaults.time_step,
                    v: defaults.velocity,
                    model: defaults.mobility_model.clone(),
                    param: defaults.mobility_params.clone(),
                    range: defaults.range,
                },
                radio: defaults.radio.clone(),
                range: defaults.range,
            }
        })
        .collect();
    NodeTable::new(nodes)
}
