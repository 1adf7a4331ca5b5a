//! Per-tick completion barrier.
//!
//! The controller creates one barrier per tick with a target equal to the
//! number of workers it dispatched to. Each distinct worker's signal for the
//! current tick counts once; the barrier releases exactly once, when the
//! last expected worker reports, regardless of arrival order.

use crate::error::CompletionError;

use super::broker::{CompletionEvent, CompletionSignal, CompletionStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierProgress {
    /// Counted; still waiting for more workers.
    Pending { received: usize, target: usize },
    /// Counted, and this was the last one.
    Released,
    /// Not counted (other tick, unknown worker, duplicate, or already released).
    Ignored,
}

/// What the barrier saw while waiting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BarrierReport {
    pub counted: usize,
    pub ignored: usize,
    /// Signals lost to subscriber overflow.
    pub lagged: u64,
    /// Sum of the pair counts carried by counted signals.
    pub pairs: usize,
}

#[derive(Debug)]
pub struct Barrier {
    tick: u64,
    arrived: Vec<bool>,
    received: usize,
    released: bool,
}

impl Barrier {
    pub fn new(tick: u64, target: usize) -> Self {
        Self {
            tick,
            arrived: vec![false; target],
            received: 0,
            released: target == 0,
        }
    }

    #[cfg(test)]
    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn record(&mut self, signal: &CompletionSignal) -> BarrierProgress {
        if self.released {
            return BarrierProgress::Ignored;
        }
        if signal.tick != self.tick {
            log::warn!(
                "Ignoring completion from worker {} for tick {} while waiting on tick {}",
                signal.worker_index,
                signal.tick,
                self.tick
            );
            return BarrierProgress::Ignored;
        }
        let Some(slot) = self.arrived.get_mut(signal.worker_index) else {
            log::warn!(
                "Ignoring completion from unknown worker {} (expecting {} workers)",
                signal.worker_index,
                self.arrived.len()
            );
            return BarrierProgress::Ignored;
        };
        if *slot {
            log::warn!("Ignoring duplicate completion from worker {} for tick {}", signal.worker_index, self.tick);
            return BarrierProgress::Ignored;
        }
        *slot = true;
        self.received += 1;
        if self.received == self.arrived.len() {
            self.released = true;
            BarrierProgress::Released
        } else {
            BarrierProgress::Pending {
                received: self.received,
                target: self.arrived.len(),
            }
        }
    }

    /// Consume signals from `completions` until every worker has reported.
    ///
    /// There is no timeout: a worker that never reports blocks this forever.
    pub async fn wait<S: CompletionStream>(mut self, completions: &mut S) -> Result<BarrierReport, CompletionError> {
        let mut report = BarrierReport::default();
        while !self.released {
            match completions.next_event().await? {
                CompletionEvent::Lagged(lost) => {
                    log::warn!("Completion subscriber lagged, {} signals lost for tick {}", lost, self.tick);
                    report.lagged += lost;
                }
                CompletionEvent::Signal(signal) => match self.record(&signal) {
                    BarrierProgress::Pending { received, target } => {
                        log::debug!("Tick {}: worker {} done ({}/{})", self.tick, signal.worker_index, received, target);
                        report.counted += 1;
                        report.pairs += signal.pairs;
                    }
                    BarrierProgress::Released => {
                        log::debug!("Tick {}: worker {} done, barrier released", self.tick, signal.worker_index);
                        report.counted += 1;
                        report.pairs += signal.pairs;
                    }
                    BarrierProgress::Ignored => report.ignored += 1,
                },
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::broker::{Broker, Transport};
    use embassy_futures::block_on;

    fn signal(tick: u64, worker_index: usize) -> CompletionSignal {
        CompletionSignal {
            tick,
            worker_index,
            pairs: 1,
        }
    }

    #[test]
    fn releases_after_all_workers_in_any_order() {
        for order in [[0, 1, 2], [2, 0, 1], [1, 2, 0]] {
            let mut barrier = Barrier::new(5, 3);
            assert_eq!(barrier.record(&signal(5, order[0])), BarrierProgress::Pending { received: 1, target: 3 });
            assert_eq!(barrier.record(&signal(5, order[1])), BarrierProgress::Pending { received: 2, target: 3 });
            assert!(!barrier.is_released());
            assert_eq!(barrier.record(&signal(5, order[2])), BarrierProgress::Released);
            assert!(barrier.is_released());
        }
    }

    #[test]
    fn releases_exactly_once() {
        let mut barrier = Barrier::new(1, 1);
        assert_eq!(barrier.record(&signal(1, 0)), BarrierProgress::Released);
        assert_eq!(barrier.record(&signal(1, 0)), BarrierProgress::Ignored);
        assert_eq!(barrier.received, 1);
    }

    #[test]
    fn duplicates_stale_and_unknown_signals_do_not_count() {
        let mut barrier = Barrier::new(2, 2);
        assert_eq!(barrier.record(&signal(2, 0)), BarrierProgress::Pending { received: 1, target: 2 });
        assert_eq!(barrier.record(&signal(2, 0)), BarrierProgress::Ignored);
        assert_eq!(barrier.record(&signal(1, 1)), BarrierProgress::Ignored);
        assert_eq!(barrier.record(&signal(2, 7)), BarrierProgress::Ignored);
        assert!(!barrier.is_released());
        assert_eq!(barrier.record(&signal(2, 1)), BarrierProgress::Released);
    }

    #[test]
    fn zero_target_is_released_immediately() {
        let barrier = Barrier::new(1, 0);
        assert!(barrier.is_released());
        let broker = Broker::new(0);
        let mut subscriber = broker.subscribe().unwrap();
        assert_eq!(block_on(barrier.wait(&mut subscriber)).unwrap(), BarrierReport::default());
    }

    #[test]
    fn wait_counts_distinct_signals_from_the_channel() {
        let broker = Broker::new(3);
        let mut subscriber = broker.subscribe().unwrap();
        block_on(async {
            for s in [signal(0, 2), signal(1, 2), signal(1, 2), signal(1, 0), signal(1, 1)] {
                broker.publish(s).await.unwrap();
            }
        });
        let report = block_on(Barrier::new(1, 3).wait(&mut subscriber)).unwrap();
        assert_eq!(report.counted, 3);
        assert_eq!(report.ignored, 2);
        assert_eq!(report.pairs, 3);
        assert_eq!(report.lagged, 0);
    }
}
