//! Snapshot codec: the per-tick set of node positions the controller
//! broadcasts to every worker queue.
//!
//! Wire format (JSON):
//!
//! ```text
//! {"tick": 7, "nodes": [{"id": 0, "coordinates": [x, y, z]}, ...]}
//! ```
//!
//! A snapshot is encoded once and the same bytes are enqueued for every
//! worker, so nothing can change between deliveries.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;

use super::node_table::NodeTable;
use super::types::DIMENSIONS;

/// Task kind for snapshot messages on worker queues.
pub const SNAPSHOT_DELIVERY: &str = "snapshot:delivery";

/// One node's position in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryPoint {
    pub id: u32,
    pub coordinates: [f64; DIMENSIONS],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    #[serde(rename = "nodes")]
    pub points: Vec<DeliveryPoint>,
}

impl Snapshot {
    /// Capture every node of `table`, in ID order.
    pub fn from_table(tick: u64, table: &NodeTable) -> Result<Self, SnapshotError> {
        let points = table
            .iter()
            .map(|node| {
                let pos = node.position();
                if pos.is_finite() {
                    Ok(DeliveryPoint {
                        id: node.id,
                        coordinates: pos.coordinates(),
                    })
                } else {
                    Err(SnapshotError::NonFinite { id: node.id })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { tick, points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        serde_json::to_vec(self).map_err(|e| SnapshotError::Malformed(e.to_string()))
    }

    /// Parse and validate a payload. Coordinates must have exactly three
    /// finite components and IDs must be unique.
    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let snapshot: Snapshot = serde_json::from_slice(bytes).map_err(|e| SnapshotError::Malformed(e.to_string()))?;
        let mut seen = HashSet::with_capacity(snapshot.points.len());
        for point in &snapshot.points {
            if !seen.insert(point.id) {
                return Err(SnapshotError::Malformed(format!("node {} appears more than once", point.id)));
            }
            if !point.coordinates.iter().all(|c| c.is_finite()) {
                return Err(SnapshotError::NonFinite { id: point.id });
            }
        }
        Ok(snapshot)
    }
}

/// A message on a worker queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub kind: String,
    pub payload: Arc<[u8]>,
}

impl Task {
    pub fn snapshot_delivery(snapshot: &Snapshot) -> Result<Self, SnapshotError> {
        Ok(Self {
            kind: SNAPSHOT_DELIVERY.to_string(),
            payload: snapshot.encode()?.into(),
        })
    }

    /// Decode the payload of a snapshot delivery task.
    pub fn snapshot(&self) -> Result<Snapshot, SnapshotError> {
        if self.kind != SNAPSHOT_DELIVERY {
            return Err(SnapshotError::UnexpectedKind(self.kind.clone()));
        }
        Snapshot::decode(&self.payload)
    }
}
