//! Tick controller: advances every node, broadcasts the resulting snapshot to
//! all worker queues, then waits for each worker to report completion.

use crate::collaborators::MobilityModel;
use crate::error::TickError;

use super::barrier::{Barrier, BarrierReport};
use super::broker::{Transport, queue_name};
use super::node_table::NodeTable;
use super::snapshot::{Snapshot, Task};

/// Outcome of one controller tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickSummary {
    pub tick: u64,
    pub nodes: usize,
    /// Nodes whose position was left unchanged because the mobility call failed.
    pub mobility_failures: usize,
    /// Worker queues the snapshot was enqueued on.
    pub dispatched: usize,
    pub signals: BarrierReport,
}

pub struct TickController<M: MobilityModel> {
    table: NodeTable,
    mobility: M,
    worker_count: usize,
    tick: u64,
}

impl<M: MobilityModel> TickController<M> {
    pub fn new(table: NodeTable, mobility: M, worker_count: usize) -> Self {
        Self {
            table,
            mobility,
            worker_count,
            tick: 0,
        }
    }

    #[cfg(test)]
    pub fn table(&self) -> &NodeTable {
        &self.table
    }

    /// Ask the mobility model for every node's next state and store it.
    ///
    /// Failures are per node: the node keeps its previous state and the tick
    /// goes on. Returns the number of nodes that were not updated.
    pub fn refresh_positions(&mut self) -> usize {
        let mut failures = 0;
        for id in 0..self.table.len() as u32 {
            let Some(node) = self.table.get(id) else {
                continue;
            };
            match self.mobility.next_state(&node.mobility) {
                Ok(state) if state.pos.is_finite() => {
                    if let Err(err) = self.table.set_mobility(id, state) {
                        log::warn!("Node {}: {}", id, err);
                        failures += 1;
                    }
                }
                Ok(state) => {
                    log::warn!("Node {}: mobility model returned non-finite position {:?}, keeping previous", id, state.pos);
                    failures += 1;
                }
                Err(err) => {
                    log::warn!("Node {}: mobility update failed, keeping previous position: {}", id, err);
                    failures += 1;
                }
            }
        }
        failures
    }

    /// Run one tick to completion.
    ///
    /// The completion subscription is taken before anything is dispatched, so
    /// no worker can finish unobserved. A failed enqueue aborts the tick
    /// without waiting; workers that did receive the snapshot report a tick
    /// number no later barrier will count.
    pub async fn run_tick<T: Transport>(&mut self, transport: &T) -> Result<TickSummary, TickError> {
        self.tick += 1;
        let tick = self.tick;
        log::info!("Tick {} starting: {} nodes, {} workers", tick, self.table.len(), self.worker_count);
        let mut completions = transport.subscribe()?;

        let mobility_failures = self.refresh_positions();
        if mobility_failures > 0 {
            log::warn!("Tick {}: {} of {} nodes kept their previous position", tick, mobility_failures, self.table.len());
        }

        let snapshot = Snapshot::from_table(tick, &self.table)?;
        let task = Task::snapshot_delivery(&snapshot)?;
        for worker_index in 0..self.worker_count {
            let name = queue_name(worker_index);
            transport.enqueue(&name, task.clone())?;
            log::debug!("Tick {}: snapshot of {} nodes enqueued on {}", tick, snapshot.len(), name);
        }

        let signals = Barrier::new(tick, self.worker_count).wait(&mut completions).await?;
        log::info!(
            "Tick {} complete: {} workers reported {} pairs",
            tick,
            signals.counted,
            signals.pairs
        );

        Ok(TickSummary {
            tick,
            nodes: self.table.len(),
            mobility_failures,
            dispatched: self.worker_count,
            signals,
        })
    }
}
