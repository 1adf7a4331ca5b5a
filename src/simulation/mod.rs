//! Distributed tick pipeline.
//!
//! One tick moves every node, then finds every pair of nodes within radio
//! range and asks the channel model about each directed link:
//!
//! - `controller`: refreshes positions through the mobility model, encodes a
//!   `Snapshot`, enqueues it on every worker queue and waits on a `Barrier`
//! - `worker`: applies the snapshot to its own `NodeTable`, builds a k-d tree
//!   over all nodes and evaluates the links of its `IndexShard`
//! - `broker`: the named queues and the completion topic joining the two,
//!   in process or over Redis (`redis_broker`)
//!
//! ## Module Organization
//!
//! - `types`: node, radio and mobility data
//! - `geometry` / `kdtree`: distances, bounding boxes and the spatial index
//! - `node_table`: dense ID-indexed node storage
//! - `snapshot`: wire format of the per-tick position broadcast
//! - `partition`: shard planning
//! - `neighbors`: range queries over a shard
//! - `scenario`: seeded initial placement

pub mod barrier;
pub mod broker;
pub mod controller;
pub mod geometry;
pub mod kdtree;
pub mod neighbors;
pub mod node_table;
pub mod partition;
pub mod redis_broker;
pub mod scenario;
pub mod snapshot;
pub mod types;
pub mod worker;

#[cfg(test)]
pub mod fixtures;

pub use broker::{Broker, MAX_WORKERS, Transport};
pub use redis_broker::RedisBroker;
pub use controller::TickController;
pub use scenario::generate_nodes;
pub use worker::{TickWorker, WorkerConfig};
