//! Type definitions for the simulation.
//!
//! Contains the data structures shared by the controller and the workers:
//! - Node positions and radio parameters
//! - Mobility state exchanged with the mobility model
//! - Neighbor pairs produced by discovery
//!
//! Field names on the wire types follow the collaborator services' JSON
//! (lowercase keys); capitalized aliases are accepted on input.

use serde::{Deserialize, Serialize};

/// Number of spatial axes.
pub const DIMENSIONS: usize = 3;

/// Position in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    #[serde(alias = "X")]
    pub x: f64,
    #[serde(alias = "Y")]
    pub y: f64,
    #[serde(alias = "Z")]
    pub z: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn from_coordinates(coordinates: [f64; DIMENSIONS]) -> Self {
        Self::new(coordinates[0], coordinates[1], coordinates[2])
    }

    pub fn coordinates(&self) -> [f64; DIMENSIONS] {
        [self.x, self.y, self.z]
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Velocity in meters per second, per axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    #[serde(alias = "X")]
    pub x: f64,
    #[serde(alias = "Y")]
    pub y: f64,
    #[serde(alias = "Z")]
    pub z: f64,
}

/// Physical-layer parameters of a node. Opaque to the tick pipeline; passed
/// to the channel model unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadioParams {
    /// Carrier frequency (Hz).
    pub frequency: f64,
    /// Bit rate (bit/s).
    #[serde(rename = "bitrate", alias = "bit-rate")]
    pub bit_rate: f64,
    pub modulation: String,
    /// Bandwidth (Hz).
    pub bandwidth: f64,
    /// Nakagami shape factor; 0 lets the channel model choose.
    pub m: f64,
    /// Transmit power (dBm).
    #[serde(rename = "powerindbm", alias = "power-in-dbm")]
    pub power_in_dbm: f64,
}

impl Default for RadioParams {
    fn default() -> Self {
        Self {
            frequency: 2.4e9,
            bit_rate: 5.0e7,
            modulation: "BPSK".to_string(),
            bandwidth: 2.0e7,
            m: 0.0,
            power_in_dbm: 20.0,
        }
    }
}

/// A node's full kinematic state as understood by the mobility model.
///
/// `param` is model specific and forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobilityState {
    #[serde(alias = "Pos")]
    pub pos: Position,
    /// Time step (s) the model should advance by.
    #[serde(alias = "Time")]
    pub time: f64,
    #[serde(alias = "V")]
    pub v: Velocity,
    #[serde(alias = "Model")]
    pub model: String,
    #[serde(alias = "Param", default)]
    pub param: serde_json::Value,
    /// Radio range (m); informational for the mobility model.
    #[serde(alias = "Range", default)]
    pub range: f64,
}

/// One simulated network endpoint.
///
/// `id` doubles as the slot index in [`super::node_table::NodeTable`] and as
/// the payload attached to spatial index entries.
#[derive(Debug, Clone, PartialEq)]
pub struct SimNode {
    pub id: u32,
    pub mobility: MobilityState,
    pub radio: RadioParams,
    /// Radius (m) within which another node counts as a neighbor.
    pub range: f64,
}

impl SimNode {
    pub fn position(&self) -> Position {
        self.mobility.pos
    }
}

/// A discovered link from `source` (a node in the worker's shard) to
/// `neighbor` (any node within the source's range).
///
/// Discovery is directional because ranges are per node; the relationship it
/// describes is unordered, see [`NeighborPair::unordered`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NeighborPair {
    pub source: u32,
    pub neighbor: u32,
}

#[cfg(test)]
impl NeighborPair {
    /// The pair with the smaller ID first.
    pub fn unordered(&self) -> (u32, u32) {
        (self.source.min(self.neighbor), self.source.max(self.neighbor))
    }
}
