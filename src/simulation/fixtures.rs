//! Shared test fixtures.

use super::node_table::NodeTable;
use super::types::{MobilityState, Position, RadioParams, SimNode, Velocity};

pub fn node(id: u32, position: Position, range: f64) -> SimNode {
    SimNode {
        id,
        mobility: MobilityState {
            pos: position,
            time: 10.0,
            v: Velocity::default(),
            model: "RandomWalk".to_string(),
            param: serde_json::Value::Null,
            range,
        },
        radio: RadioParams::default(),
        range,
    }
}

/// Table with one node per coordinate, all sharing `range`.
pub fn table_at(coordinates: &[[f64; 3]], range: f64) -> NodeTable {
    let nodes = coordinates
        .iter()
        .enumerate()
        .map(|(i, c)| node(i as u32, Position::from_coordinates(*c), range))
        .collect();
    NodeTable::new(nodes).unwrap()
}

/// The four-node line used by the end-to-end checks: two clusters ten
/// meters apart, range 2.
pub const CLUSTERS: [[f64; 3]; 4] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [10.0, 0.0, 0.0], [11.0, 0.0, 0.0]];
