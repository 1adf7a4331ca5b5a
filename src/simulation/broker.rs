//! Message transport between the controller and the workers: one named
//! queue per worker plus a broadcast completion topic.
//!
//! The controller is the only producer on the worker queues and each worker
//! consumes only its own queue. Workers publish on the completion topic and
//! the controller subscribes to it. Messages move by value; no node state is
//! shared.
//!
//! [`Transport`] is implemented by the in-process [`Broker`] below, used
//! when every worker runs as a thread of one process, and by
//! [`RedisBroker`](super::redis_broker::RedisBroker) when the controller and
//! each worker run as separate processes.
//!
//! `Broker` queues are bounded `embassy-sync` channels and never block the
//! producer: a full queue is reported as a dispatch failure.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use embassy_sync::pubsub::{PubSubChannel, Subscriber, WaitResult};
use serde::{Deserialize, Serialize};

use crate::error::{CompletionError, DispatchError};

use super::snapshot::Task;

/// Upper bound on workers; also the publisher slot count on the completion
/// topic.
pub const MAX_WORKERS: usize = 32;

/// Depth of each worker queue. One snapshot per tick is expected; the slack
/// absorbs a worker that is one tick behind.
pub const WORKER_QUEUE_DEPTH: usize = 4;
/// Bounded channel carrying tasks to one worker.
pub type WorkerQueue = Channel<CriticalSectionRawMutex, Task, WORKER_QUEUE_DEPTH>;

/// Completion messages buffered per subscriber before lagging.
pub const COMPLETION_CAPACITY: usize = 2 * MAX_WORKERS;
/// Concurrent subscribers on the completion topic.
pub const COMPLETION_SUBSCRIBERS: usize = 2;
/// Broadcast channel carrying completion signals to the controller.
pub type CompletionChannel =
    PubSubChannel<CriticalSectionRawMutex, CompletionSignal, COMPLETION_CAPACITY, COMPLETION_SUBSCRIBERS, MAX_WORKERS>;
pub type CompletionSubscriber<'a> =
    Subscriber<'a, CriticalSectionRawMutex, CompletionSignal, COMPLETION_CAPACITY, COMPLETION_SUBSCRIBERS, MAX_WORKERS>;

/// Published once by a worker after it finished its shard for `tick`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionSignal {
    pub tick: u64,
    pub worker_index: usize,
    /// Neighbor pairs the worker discovered; informational only.
    pub pairs: usize,
}

/// What a completion subscription yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionEvent {
    Signal(CompletionSignal),
    /// This many signals were lost to subscriber overflow.
    Lagged(u64),
}

/// Name of the queue served by `worker_index` (`queue1`, `queue2`, ...).
pub fn queue_name(worker_index: usize) -> String {
    format!("queue{}", worker_index + 1)
}

/// A subscription to the completion topic.
pub trait CompletionStream {
    async fn next_event(&mut self) -> Result<CompletionEvent, CompletionError>;
}

/// Queues and completion topic as seen by the controller and the workers.
pub trait Transport {
    type Completions<'a>: CompletionStream
    where
        Self: 'a;

    /// Put `task` on the named queue without waiting for a consumer.
    fn enqueue(&self, queue: &str, task: Task) -> Result<(), DispatchError>;

    /// Wait for the next task on the named queue.
    async fn receive(&self, queue: &str) -> Result<Task, DispatchError>;

    /// Subscribe to completion signals. Only signals published after this
    /// call are delivered to the returned subscription.
    fn subscribe(&self) -> Result<Self::Completions<'_>, CompletionError>;

    async fn publish(&self, signal: CompletionSignal) -> Result<(), CompletionError>;
}

impl CompletionStream for CompletionSubscriber<'_> {
    async fn next_event(&mut self) -> Result<CompletionEvent, CompletionError> {
        Ok(match self.next_message().await {
            WaitResult::Lagged(lost) => CompletionEvent::Lagged(lost),
            WaitResult::Message(signal) => CompletionEvent::Signal(signal),
        })
    }
}

struct NamedQueue {
    name: String,
    channel: WorkerQueue,
}

/// In-process transport for workers running as threads of one process.
pub struct Broker {
    queues: Vec<NamedQueue>,
    completions: CompletionChannel,
}

impl Broker {
    /// Create queues for workers `0..worker_count`.
    pub fn new(worker_count: usize) -> Self {
        let queues = (0..worker_count)
            .map(|i| NamedQueue {
                name: queue_name(i),
                channel: WorkerQueue::new(),
            })
            .collect();
        Self {
            queues,
            completions: CompletionChannel::new(),
        }
    }

    fn queue(&self, name: &str) -> Result<&WorkerQueue, DispatchError> {
        self.queues
            .iter()
            .find(|q| q.name == name)
            .map(|q| &q.channel)
            .ok_or_else(|| DispatchError::UnknownQueue(name.to_string()))
    }
}

impl Transport for Broker {
    type Completions<'a> = CompletionSubscriber<'a>;

    fn enqueue(&self, name: &str, task: Task) -> Result<(), DispatchError> {
        self.queue(name)?
            .try_send(task)
            .map_err(|_: TrySendError<Task>| DispatchError::QueueFull(name.to_string()))
    }

    async fn receive(&self, name: &str) -> Result<Task, DispatchError> {
        Ok(self.queue(name)?.receive().await)
    }

    fn subscribe(&self) -> Result<CompletionSubscriber<'_>, CompletionError> {
        self.completions.subscriber().map_err(|e| CompletionError(format!("{:?}", e)))
    }

    async fn publish(&self, signal: CompletionSignal) -> Result<(), CompletionError> {
        let publisher = self.completions.publisher().map_err(|e| CompletionError(format!("{:?}", e)))?;
        publisher.publish(signal).await;
        Ok(())
    }
}
