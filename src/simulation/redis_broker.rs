//! Redis-backed transport for running the controller and each worker as
//! separate processes.
//!
//! Worker queues are Redis lists named `queue1`..`queueN` (`RPUSH` by the
//! controller, `BLPOP` by the worker). Completion signals are JSON messages
//! on the `task_notification` pub/sub channel.
//!
//! Every call blocks the calling thread. Each process runs a single task on
//! its executor, so nothing else is starved while a call waits.

use redis::{Client, Connection, Msg, Value};
use serde::{Deserialize, Serialize};

use crate::error::{CompletionError, DispatchError};

use super::broker::{CompletionEvent, CompletionSignal, CompletionStream, Transport, queue_name};
use super::snapshot::Task;

/// Pub/sub channel carrying completion signals.
pub const COMPLETION_TOPIC: &str = "task_notification";

/// A task as stored in a Redis list.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    payload: String,
}

fn encode_task(task: &Task) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&Envelope {
        kind: task.kind.clone(),
        payload: String::from_utf8_lossy(&task.payload).into_owned(),
    })
}

fn decode_task(raw: &[u8]) -> Result<Task, serde_json::Error> {
    let envelope: Envelope = serde_json::from_slice(raw)?;
    Ok(Task {
        kind: envelope.kind,
        payload: envelope.payload.into_bytes().into(),
    })
}

/// Completion signal carried by a pub/sub message, if it is one.
fn decode_signal(value: Value) -> Option<Result<CompletionSignal, String>> {
    let msg = Msg::from_owned_value(value)?;
    if msg.get_channel_name() != COMPLETION_TOPIC {
        return None;
    }
    Some(
        msg.get_payload::<Vec<u8>>()
            .map_err(|e| e.to_string())
            .and_then(|payload| serde_json::from_slice(&payload).map_err(|e| e.to_string())),
    )
}

pub struct RedisBroker {
    client: Client,
    worker_count: usize,
}

impl RedisBroker {
    /// `url` is a Redis connection URL such as `redis://127.0.0.1:6379/`.
    /// No connection is made until the first call.
    pub fn open(url: &str, worker_count: usize) -> redis::RedisResult<Self> {
        Ok(Self {
            client: Client::open(url)?,
            worker_count,
        })
    }

    fn check_queue(&self, name: &str) -> Result<(), DispatchError> {
        if (0..self.worker_count).any(|i| queue_name(i) == name) {
            Ok(())
        } else {
            Err(DispatchError::UnknownQueue(name.to_string()))
        }
    }

    fn connection(&self, queue: &str) -> Result<Connection, DispatchError> {
        self.client.get_connection().map_err(|e| DispatchError::Broker {
            queue: queue.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Subscription on [`COMPLETION_TOPIC`] holding its own connection.
pub struct RedisCompletions {
    connection: Connection,
}

impl CompletionStream for RedisCompletions {
    async fn next_event(&mut self) -> Result<CompletionEvent, CompletionError> {
        loop {
            let value = self.connection.recv_response().map_err(|e| CompletionError(e.to_string()))?;
            match decode_signal(value) {
                Some(Ok(signal)) => return Ok(CompletionEvent::Signal(signal)),
                Some(Err(reason)) => log::warn!("Ignoring unreadable completion message: {}", reason),
                None => {}
            }
        }
    }
}

impl Transport for RedisBroker {
    type Completions<'a> = RedisCompletions;

    fn enqueue(&self, queue: &str, task: Task) -> Result<(), DispatchError> {
        self.check_queue(queue)?;
        let bytes = encode_task(&task).map_err(|e| DispatchError::Broker {
            queue: queue.to_string(),
            reason: e.to_string(),
        })?;
        let mut connection = self.connection(queue)?;
        redis::cmd("RPUSH")
            .arg(queue)
            .arg(bytes)
            .query::<i64>(&mut connection)
            .map_err(|e| DispatchError::Broker {
                queue: queue.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn receive(&self, queue: &str) -> Result<Task, DispatchError> {
        self.check_queue(queue)?;
        let mut connection = self.connection(queue)?;
        loop {
            let (_, raw): (String, Vec<u8>) = redis::cmd("BLPOP")
                .arg(queue)
                .arg(0)
                .query(&mut connection)
                .map_err(|e| DispatchError::Broker {
                    queue: queue.to_string(),
                    reason: e.to_string(),
                })?;
            match decode_task(&raw) {
                Ok(task) => return Ok(task),
                Err(err) => log::error!("Dropping undecodable message on {}: {}", queue, err),
            }
        }
    }

    fn subscribe(&self) -> Result<RedisCompletions, CompletionError> {
        let mut connection = self.client.get_connection().map_err(|e| CompletionError(e.to_string()))?;
        redis::cmd("SUBSCRIBE")
            .arg(COMPLETION_TOPIC)
            .query::<Value>(&mut connection)
            .map_err(|e| CompletionError(e.to_string()))?;
        Ok(RedisCompletions { connection })
    }

    async fn publish(&self, signal: CompletionSignal) -> Result<(), CompletionError> {
        let payload = serde_json::to_vec(&signal).map_err(|e| CompletionError(e.to_string()))?;
        let mut connection = self.client.get_connection().map_err(|e| CompletionError(e.to_string()))?;
        redis::cmd("PUBLISH")
            .arg(COMPLETION_TOPIC)
            .arg(payload)
            .query::<i64>(&mut connection)
            .map_err(|e| CompletionError(e.to_string()))?;
        Ok(())
    }
}
