//! Per-process table of simulated nodes, indexed by dense node ID.
//!
//! Slot `i` always holds the node with ID `i`. Mutations by ID write to that
//! slot in place; the table never appends or reorders after construction.

use crate::error::TableError;

use super::snapshot::Snapshot;
use super::types::{MobilityState, Position, SimNode};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeTable {
    nodes: Vec<SimNode>,
}

impl NodeTable {
    /// Wrap a fully initialized node list, rejecting it unless every node
    /// sits in the slot matching its ID.
    pub fn new(nodes: Vec<SimNode>) -> Result<Self, TableError> {
        if let Some((slot, node)) = nodes.iter().enumerate().find(|(slot, node)| node.id as usize != *slot) {
            return Err(TableError::Misaligned { slot, id: node.id });
        }
        Ok(Self { nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&SimNode> {
        self.nodes.get(id as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SimNode> {
        self.nodes.iter()
    }

    fn slot_mut(&mut self, id: u32) -> Result<&mut SimNode, TableError> {
        let node_count = self.nodes.len();
        self.nodes.get_mut(id as usize).ok_or(TableError::UnknownNodeId { id, node_count })
    }

    #[cfg(test)]
    pub fn set_position(&mut self, id: u32, position: Position) -> Result<(), TableError> {
        self.slot_mut(id)?.mobility.pos = position;
        Ok(())
    }

    /// Replace a node's kinematic state (position, velocity, model params).
    pub fn set_mobility(&mut self, id: u32, mobility: MobilityState) -> Result<(), TableError> {
        self.slot_mut(id)?.mobility = mobility;
        Ok(())
    }

    /// Overwrite the position of every node named in `snapshot`.
    ///
    /// Radio parameters and ranges are untouched. All IDs are checked before
    /// anything is written, so an `UnknownNodeId` leaves the table exactly as
    /// it was. Applying the same snapshot again is a no-op.
    pub fn apply(&mut self, snapshot: &Snapshot) -> Result<usize, TableError> {
        let node_count = self.nodes.len();
        if let Some(point) = snapshot.points.iter().find(|p| p.id as usize >= node_count) {
            return Err(TableError::UnknownNodeId { id: point.id, node_count });
        }
        for point in &snapshot.points {
            self.nodes[point.id as usize].mobility.pos = Position::from_coordinates(point.coordinates);
        }
        Ok(snapshot.points.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::fixtures::node;
    use crate::simulation::snapshot::DeliveryPoint;
    use crate::simulation::types::RadioParams;

    fn table(n: u32) -> NodeTable {
        NodeTable::new((0..n).map(|i| node(i, Position::default(), 5.0)).collect()).unwrap()
    }

    fn snapshot(points: &[(u32, [f64; 3])]) -> Snapshot {
        Snapshot {
            tick: 1,
            points: points.iter().map(|(id, c)| DeliveryPoint { id: *id, coordinates: *c }).collect(),
        }
    }

    #[test]
    fn rejects_misaligned_nodes() {
        let nodes = vec![node(0, Position::default(), 1.0), node(2, Position::default(), 1.0)];
        assert_eq!(NodeTable::new(nodes), Err(TableError::Misaligned { slot: 1, id: 2 }));
    }

    #[test]
    fn apply_overwrites_positions_in_place() {
        let mut t = table(3);
        let mut radio = RadioParams::default();
        radio.frequency = 915e6;
        t.nodes[1].radio = radio.clone();

        let applied = t.apply(&snapshot(&[(1, [4.0, 5.0, 6.0]), (2, [7.0, 8.0, 9.0])])).unwrap();

        assert_eq!(applied, 2);
        assert_eq!(t.get(0).unwrap().position(), Position::default());
        assert_eq!(t.get(1).unwrap().position(), Position::new(4.0, 5.0, 6.0));
        assert_eq!(t.get(2).unwrap().position(), Position::new(7.0, 8.0, 9.0));
        assert_eq!(t.get(1).unwrap().radio, radio);
        assert_eq!(t.get(1).unwrap().range, 5.0);
        assert!(t.iter().enumerate().all(|(i, n)| n.id as usize == i));
    }

    #[test]
    fn apply_is_idempotent() {
        let s = snapshot(&[(0, [1.0, 1.0, 1.0]), (2, [3.0, 2.0, 1.0])]);
        let mut once = table(3);
        once.apply(&s).unwrap();
        let mut twice = once.clone();
        twice.apply(&s).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn apply_unknown_id_leaves_table_untouched() {
        let mut t = table(4);
        let before = t.clone();
        let err = t.apply(&snapshot(&[(0, [9.0, 9.0, 9.0]), (4, [1.0, 1.0, 1.0])])).unwrap_err();
        assert_eq!(err, TableError::UnknownNodeId { id: 4, node_count: 4 });
        assert_eq!(t, before);
    }

    #[test]
    fn set_position_by_id() {
        let mut t = table(2);
        t.set_position(1, Position::new(1.0, 2.0, 3.0)).unwrap();
        assert_eq!(t.get(1).unwrap().position(), Position::new(1.0, 2.0, 3.0));
        assert_eq!(
            t.set_position(7, Position::default()),
            Err(TableError::UnknownNodeId { id: 7, node_count: 2 })
        );
    }
}
