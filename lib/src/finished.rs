//! Collection of completed processes shared by every node
use crate::prio_queue::PriorityQueue;
use crate::process::{Process, Tick};

use log::debug;
use parking_lot::Mutex;

/// Global report order: finish time, then node id, then per-node process id.
pub type FinishKey = (Tick, usize, usize);

pub fn finish_key(process: &Process) -> FinishKey {
    (process.finish_time(), process.node_id(), process.id())
}

/// The only state shared between node workers. Insertion is serialized by a
/// mutex; draining consumes the aggregator, so it can only happen once every
/// worker has given up its reference.
#[derive(Default)]
pub struct FinishedAggregator {
    finished: Mutex<PriorityQueue<FinishKey, Process>>,
}

impl FinishedAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, process: Process) {
        let key = finish_key(&process);
        debug!(
            "Recording process {}.{} finished at {}",
            process.node_id(),
            process.id(),
            process.finish_time()
        );
        self.finished.lock().push(process, key);
    }

    /// Yield every recorded process in ascending `FinishKey` order.
    pub fn drain(self) -> Vec<Process> {
        let mut finished = self.finished.into_inner();
        std::iter::from_fn(|| finished.pop()).collect()
    }
}
