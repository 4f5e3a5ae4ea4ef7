//! Run every node on its own thread and collect the global report
use crate::finished::FinishedAggregator;
use crate::node_scheduler::{NodeScheduler, StateTransition};
use crate::process::{Process, Tick};

use log::info;
use serde_derive::{Deserialize, Serialize};
use std::{thread, time::Duration};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    #[error("Quantum must be at least one tick")]
    ZeroQuantum,
    #[error("At least one node is required")]
    NoNodes,
    #[error("Process `{name}` is assigned to node {node_id}, but only nodes 1..={node_count} exist")]
    NodeOutOfRange {
        name: String,
        node_id: usize,
        node_count: usize,
    },
    #[error("Process `{name}` belongs to node {node_id} and cannot be admitted on node {expected}")]
    WrongNode {
        name: String,
        node_id: usize,
        expected: usize,
    },
    #[error("Worker of node {0} panicked")]
    WorkerPanicked(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub quantum: Tick,
    pub node_count: usize,
}

impl SimulationConfig {
    pub fn new(quantum: Tick, node_count: usize) -> Result<Self, SimulationError> {
        if quantum == 0 {
            return Err(SimulationError::ZeroQuantum);
        }
        if node_count == 0 {
            return Err(SimulationError::NoNodes);
        }
        Ok(Self {
            quantum,
            node_count,
        })
    }
}

#[derive(Debug)]
pub struct SimulationReport {
    pub config: SimulationConfig,
    /// Completed processes in (finish time, node id, process id) order.
    pub finished: Vec<Process>,
    /// Grouped by node in node id order, each node's in local time order.
    pub transitions: Vec<StateTransition>,
}

impl SimulationReport {
    /// Latest finish time over all nodes.
    pub fn schedule_length(&self) -> Tick {
        self.finished
            .iter()
            .map(Process::finish_time)
            .max()
            .unwrap_or(0)
    }

    pub fn average_wait_time(&self) -> f32 {
        if self.finished.is_empty() {
            return 0.0;
        }
        self.finished
            .iter()
            .map(|process| process.wait_time() as f32)
            .sum::<f32>()
            / self.finished.len() as f32
    }
}

pub struct Simulation {
    config: SimulationConfig,
    schedulers: Vec<NodeScheduler>,
    finished: FinishedAggregator,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            schedulers: (1..=config.node_count)
                .map(|node_id| NodeScheduler::new(node_id, config.quantum))
                .collect(),
            finished: FinishedAggregator::new(),
        }
    }

    pub fn config(&self) -> SimulationConfig {
        self.config
    }

    /// Hand the process to the scheduler of the node it is assigned to.
    pub fn admit(&mut self, process: Process) -> Result<(), SimulationError> {
        let node_count = self.config.node_count;
        let Some(scheduler) = process
            .node_id()
            .checked_sub(1)
            .and_then(|index| self.schedulers.get_mut(index))
        else {
            return Err(SimulationError::NodeOutOfRange {
                name: process.name().clone(),
                node_id: process.node_id(),
                node_count,
            });
        };
        scheduler.admit(process, &self.finished).map(|_| ())
    }

    pub fn set_node_tick_delay(
        &mut self,
        node_id: usize,
        delay: Duration,
    ) -> Result<(), SimulationError> {
        let node_count = self.config.node_count;
        let scheduler = node_id
            .checked_sub(1)
            .and_then(|index| self.schedulers.get_mut(index))
            .ok_or(SimulationError::NodeOutOfRange {
                name: String::new(),
                node_id,
                node_count,
            })?;
        scheduler.set_tick_delay(delay);
        Ok(())
    }

    /// Run all nodes in parallel, wait for every one of them and drain the
    /// finished processes once.
    pub fn simulate(self) -> Result<SimulationReport, SimulationError> {
        let Simulation {
            config,
            schedulers,
            finished,
        } = self;
        info!(
            "Simulating {} nodes with quantum {}",
            config.node_count, config.quantum
        );

        let transitions = thread::scope(|scope| {
            let finished = &finished;
            let workers = schedulers
                .into_iter()
                .map(|mut scheduler| {
                    let node_id = scheduler.node_id();
                    let worker = scope.spawn(move || {
                        scheduler.run(finished);
                        scheduler.into_transitions()
                    });
                    (node_id, worker)
                })
                .collect::<Vec<_>>();

            let mut transitions = Vec::new();
            for (node_id, worker) in workers {
                let node_transitions = worker
                    .join()
                    .map_err(|_| SimulationError::WorkerPanicked(node_id))?;
                transitions.extend(node_transitions);
            }
            Ok::<_, SimulationError>(transitions)
        })?;

        let finished = finished.drain();
        info!("Simulation finished with {} processes", finished.len());
        Ok(SimulationReport {
            config,
            finished,
            transitions,
        })
    }
}

/// Admit `processes` on `node_count` nodes sharing `quantum` and run them to completion.
pub fn simulate(
    node_count: usize,
    quantum: Tick,
    processes: Vec<Process>,
) -> Result<SimulationReport, SimulationError> {
    let mut simulation = Simulation::new(SimulationConfig::new(quantum, node_count)?);
    for process in processes {
        simulation.admit(process)?;
    }
    simulation.simulate()
}
