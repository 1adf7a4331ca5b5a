//! Error types for the tick pipeline.
//!
//! Collaborator failures are isolated per node or per pair and never abort a
//! tick. Everything else is structural and aborts the unit of work it occurs
//! in: one `apply` call, one tick, or one queued message.

use thiserror::Error;

/// Failures talking to an external collaborator (registry, mobility model,
/// channel model).
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The registry returned no healthy endpoint for the service.
    #[error("no healthy endpoint registered for service {0}")]
    NoEndpoint(String),

    /// The registry itself could not be queried.
    #[error("service registry lookup for {service} failed: {reason}")]
    Registry { service: String, reason: String },

    /// The request never produced a response (connect, timeout, body read).
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    /// The collaborator answered with a non-2xx status.
    #[error("{url} answered with status {status}: {body}")]
    Status { url: String, status: u16, body: String },

    /// The collaborator answered 2xx but the body was unusable.
    #[error("invalid response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },
}

impl CollaboratorError {
    /// Whether the cached endpoint should be dropped and re-resolved.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, CollaboratorError::Transport { .. })
    }
}

/// Snapshot encode/decode failures.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("malformed snapshot: {0}")]
    Malformed(String),

    #[error("unexpected task kind {0:?}")]
    UnexpectedKind(String),

    #[error("node {id} has a non-finite position")]
    NonFinite { id: u32 },
}

/// Node state table failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("node id {id} is outside the table range [0, {node_count})")]
    UnknownNodeId { id: u32, node_count: usize },

    #[error("slot {slot} holds node id {id}; the table must be index-aligned")]
    Misaligned { slot: usize, id: u32 },
}

/// Queue dispatch failures. Any of these aborts the tick before the barrier.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("no queue named {0}")]
    UnknownQueue(String),

    #[error("queue {0} is full")]
    QueueFull(String),

    /// The message broker could not be reached.
    #[error("broker unavailable for {queue}: {reason}")]
    Broker { queue: String, reason: String },
}

/// Partition planning failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("worker index {index} is out of range for {count} workers")]
    WorkerIndexOutOfRange { index: usize, count: usize },
}

/// Completion topic failures (slots exhausted or broker unreachable).
#[derive(Debug, Error)]
#[error("completion channel unavailable: {0}")]
pub struct CompletionError(pub String);

/// Failures that abort a tick on the controller side.
#[derive(Debug, Error)]
pub enum TickError {
    #[error("dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("could not build snapshot: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Completion(#[from] CompletionError),
}

/// Worker-side failures. Snapshot and table errors drop one queued message;
/// queue and completion errors stop the worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Completion(#[from] CompletionError),
}
