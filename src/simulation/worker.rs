//! Tick worker: computes the links of one shard of the node ID space.
//!
//! Each worker owns a private node table, rebuilt from every snapshot it
//! receives, and reads only its own queue. The only thing it sends back is
//! one completion signal per successfully processed snapshot.

use crate::collaborators::channel::link_id;
use crate::collaborators::{ChannelModel, LinkModels, LinkRequest};
use crate::error::{PlanError, WorkerError};

use super::broker::{CompletionSignal, Transport, queue_name};
use super::neighbors::{build_index, discover_neighbors};
use super::node_table::NodeTable;
use super::partition::{IndexShard, plan};
use super::snapshot::Task;

/// Which shard this worker computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    pub index: usize,
    pub count: usize,
}

/// What one worker did with one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardReport {
    pub tick: u64,
    pub shard: IndexShard,
    pub nodes_scanned: usize,
    pub pairs_found: usize,
    pub channel_failures: usize,
}

pub struct TickWorker<C: ChannelModel> {
    config: WorkerConfig,
    queue: String,
    table: NodeTable,
    channel: C,
    link_models: LinkModels,
}

impl<C: ChannelModel> TickWorker<C> {
    pub fn new(config: WorkerConfig, table: NodeTable, channel: C, link_models: LinkModels) -> Result<Self, PlanError> {
        plan(table.len(), config.count, config.index)?;
        Ok(Self {
            config,
            queue: queue_name(config.index),
            table,
            channel,
            link_models,
        })
    }

    pub fn config(&self) -> WorkerConfig {
        self.config
    }

    #[cfg(test)]
    pub fn table(&self) -> &NodeTable {
        &self.table
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Process one snapshot: update the table, index every node, and
    /// evaluate each link whose source lies in this worker's shard.
    ///
    /// A malformed snapshot or an unknown node ID fails the whole message
    /// before any link is evaluated. Channel model failures are counted per
    /// link and do not fail the message.
    pub fn handle_task(&mut self, task: &Task) -> Result<ShardReport, WorkerError> {
        let snapshot = task.snapshot()?;
        self.table.apply(&snapshot)?;

        let index = build_index(&self.table);
        let shard = plan(self.table.len(), self.config.count, self.config.index)?;
        let pairs = discover_neighbors(&self.table, &index, shard);

        let node_count = self.table.len();
        let mut channel_failures = 0;
        for pair in &pairs {
            let (Some(tx), Some(rx)) = (self.table.get(pair.source), self.table.get(pair.neighbor)) else {
                continue;
            };
            let request = LinkRequest {
                link_id: link_id(tx.id, rx.id, node_count),
                tx_node: tx.radio.clone(),
                rx_node: rx.radio.clone(),
                tx_position: tx.position(),
                rx_position: rx.position(),
                model: self.link_models.clone(),
            };
            if let Err(err) = self.channel.evaluate_link(&request) {
                log::warn!("Tick {}: link {} -> {} not evaluated: {}", snapshot.tick, tx.id, rx.id, err);
                channel_failures += 1;
            }
        }

        Ok(ShardReport {
            tick: snapshot.tick,
            shard,
            nodes_scanned: shard.len(),
            pairs_found: pairs.len(),
            channel_failures,
        })
    }

    /// Take the next task from this worker's queue and process it.
    ///
    /// Returns `Ok(None)` when the message was dropped; no completion is
    /// signalled for it and it is not retried. Queue and completion channel
    /// errors are returned.
    pub async fn serve_one<T: Transport>(&mut self, transport: &T) -> Result<Option<ShardReport>, WorkerError> {
        let task = transport.receive(&self.queue).await?;
        let report = match self.handle_task(&task) {
            Ok(report) => report,
            Err(err) => {
                log::error!("Worker {}: dropping {} message: {}", self.config.index, task.kind, err);
                return Ok(None);
            }
        };

        log::info!(
            "Worker {} tick {}: shard {} scanned {} nodes, {} pairs, {} channel failures",
            self.config.index,
            report.tick,
            report.shard,
            report.nodes_scanned,
            report.pairs_found,
            report.channel_failures
        );

        transport
            .publish(CompletionSignal {
                tick: report.tick,
                worker_index: self.config.index,
                pairs: report.pairs_found,
            })
            .await?;
        Ok(Some(report))
    }

    /// Serve this worker's queue until the transport fails, returning the
    /// failure.
    pub async fn run<T: Transport>(mut self, transport: &T) -> WorkerError {
        log::info!("Worker {} of {} serving {}", self.config.index, self.config.count, self.queue);
        loop {
            if let Err(err) = self.serve_one(transport).await {
                return err;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollaboratorError;
    use crate::simulation::broker::Broker;
    use crate::simulation::controller::TickController;
    use crate::simulation::fixtures::{CLUSTERS, table_at};
    use crate::simulation::snapshot::Snapshot;
    use crate::simulation::types::{MobilityState, Position};
    use embassy_futures::block_on;
    use embassy_futures::join::join3;
    use embassy_sync::pubsub::WaitResult;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    /// Records every link it is asked to evaluate; fails links from
    /// `fail_from`.
    #[derive(Default)]
    struct RecordingChannel {
        calls: Mutex<Vec<LinkRequest>>,
        fail_from: Option<Position>,
    }

    impl RecordingChannel {
        fn links(&self) -> Vec<(Position, Position)> {
            self.calls.lock().unwrap().iter().map(|r| (r.tx_position, r.rx_position)).collect()
        }

        fn link_ids(&self) -> BTreeSet<u64> {
            self.calls.lock().unwrap().iter().map(|r| r.link_id).collect()
        }
    }

    impl ChannelModel for RecordingChannel {
        fn evaluate_link(&self, request: &LinkRequest) -> Result<(), CollaboratorError> {
            self.calls.lock().unwrap().push(request.clone());
            if Some(request.tx_position) == self.fail_from {
                return Err(CollaboratorError::Status {
                    url: "http://channel/model".to_string(),
                    status: 503,
                    body: String::new(),
                });
            }
            Ok(())
        }
    }

    struct Stay;

    impl crate::collaborators::MobilityModel for Stay {
        fn next_state(&self, state: &MobilityState) -> Result<MobilityState, CollaboratorError> {
            Ok(state.clone())
        }
    }

    fn worker(index: usize, count: usize) -> TickWorker<RecordingChannel> {
        TickWorker::new(
            WorkerConfig { index, count },
            table_at(&[[0.0; 3]; 4], 2.0),
            RecordingChannel::default(),
            LinkModels::default(),
        )
        .unwrap()
    }

    fn delivery(tick: u64, coordinates: &[[f64; 3]]) -> Task {
        Task::snapshot_delivery(&Snapshot::from_table(tick, &table_at(coordinates, 2.0)).unwrap()).unwrap()
    }

    #[test]
    fn rejects_out_of_range_index() {
        let result = TickWorker::new(
            WorkerConfig { index: 2, count: 2 },
            table_at(&CLUSTERS, 2.0),
            RecordingChannel::default(),
            LinkModels::default(),
        );
        assert!(matches!(result, Err(PlanError::WorkerIndexOutOfRange { index: 2, count: 2 })));
    }

    #[test]
    fn handle_task_evaluates_shard_links_from_snapshot_positions() {
        let mut w = worker(0, 2);
        let report = w.handle_task(&delivery(3, &CLUSTERS)).unwrap();

        assert_eq!(report.tick, 3);
        assert_eq!(report.shard, IndexShard { start: 0, end: 2 });
        assert_eq!(report.nodes_scanned, 2);
        assert_eq!(report.pairs_found, 2);
        assert_eq!(report.channel_failures, 0);
        assert_eq!(w.table().get(3).unwrap().position(), Position::new(11.0, 0.0, 0.0));

        let origin = Position::new(0.0, 0.0, 0.0);
        let one = Position::new(1.0, 0.0, 0.0);
        assert_eq!(w.channel().links(), vec![(origin, one), (one, origin)]);
        assert_eq!(w.channel().link_ids(), BTreeSet::from([1, 4]));
    }

    #[test]
    fn channel_failures_are_counted_not_fatal() {
        let mut w = TickWorker::new(
            WorkerConfig { index: 0, count: 1 },
            table_at(&CLUSTERS, 2.0),
            RecordingChannel {
                fail_from: Some(Position::new(10.0, 0.0, 0.0)),
                ..RecordingChannel::default()
            },
            LinkModels::default(),
        )
        .unwrap();
        let report = w.handle_task(&delivery(1, &CLUSTERS)).unwrap();
        assert_eq!(report.pairs_found, 4);
        assert_eq!(report.channel_failures, 1);
        assert_eq!(w.channel().links().len(), 4);
    }

    #[test]
    fn unknown_node_fails_message_without_links() {
        let mut w = worker(0, 1);
        let before = w.table().clone();
        let err = w.handle_task(&delivery(1, &[[0.0; 3]; 5])).unwrap_err();
        assert!(matches!(err, WorkerError::Table(_)));
        assert_eq!(w.table(), &before);
        assert!(w.channel().links().is_empty());
    }

    #[test]
    fn malformed_message_is_dropped_without_signal() {
        let broker = Broker::new(1);
        let mut subscriber = broker.subscribe().unwrap();
        let mut w = worker(0, 1);

        broker
            .enqueue(
                "queue1",
                Task {
                    kind: crate::simulation::snapshot::SNAPSHOT_DELIVERY.to_string(),
                    payload: b"{\"tick\": 1, \"nodes\": [{\"id\": 0}]}".to_vec().into(),
                },
            )
            .unwrap();
        assert_eq!(block_on(w.serve_one(&broker)).unwrap(), None);
        assert!(subscriber.try_next_message().is_none());
        assert!(w.channel().links().is_empty());

        broker.enqueue("queue1", delivery(2, &CLUSTERS)).unwrap();
        let report = block_on(w.serve_one(&broker)).unwrap().unwrap();
        assert_eq!(report.tick, 2);
        match subscriber.try_next_message() {
            Some(WaitResult::Message(signal)) => assert_eq!(
                signal,
                CompletionSignal {
                    tick: 2,
                    worker_index: 0,
                    pairs: 4
                }
            ),
            other => panic!("expected one completion signal, got {:?}", other),
        }
    }

    #[test]
    fn one_tick_end_to_end() {
        let broker = Broker::new(2);
        let mut controller = TickController::new(table_at(&CLUSTERS, 2.0), Stay, 2);
        let mut w0 = worker(0, 2);
        let mut w1 = worker(1, 2);

        let (summary, r0, r1) = block_on(join3(
            controller.run_tick(&broker),
            w0.serve_one(&broker),
            w1.serve_one(&broker),
        ));
        let summary = summary.unwrap();
        let r0 = r0.unwrap().unwrap();
        let r1 = r1.unwrap().unwrap();

        assert_eq!(summary.signals.counted, 2);
        assert_eq!(summary.signals.pairs, 4);
        assert_eq!(r0.shard, IndexShard { start: 0, end: 2 });
        assert_eq!(r1.shard, IndexShard { start: 2, end: 4 });

        let mut links: BTreeSet<(u32, u32)> = BTreeSet::new();
        for calls in [&w0.channel().calls, &w1.channel().calls] {
            for request in calls.lock().unwrap().iter() {
                let tx = (request.link_id / 4) as u32;
                let rx = (request.link_id % 4) as u32;
                links.insert((tx.min(rx), tx.max(rx)));
            }
        }
        assert_eq!(links, BTreeSet::from([(0, 1), (2, 3)]));
        assert_eq!(w0.table(), w1.table());
    }
}
