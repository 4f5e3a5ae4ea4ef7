//! This module contains the scheduler that drives one node: its ready and blocked
//! queues, its local clock and the tick loop.
use crate::finished::FinishedAggregator;
use crate::prio_queue::PriorityQueue;
use crate::process::{Operation, Process, ProcessState, Tick};
use crate::simulation::SimulationError;

use log::{debug, info, warn};
use std::{fmt, thread, time::Duration};

/// Index of a process in its node's arena. Queues hold handles, never processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessHandle(usize);

/// A change of a process's state as seen on its node's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub node_id: usize,
    pub clock: Tick,
    pub process_id: usize,
    pub state: ProcessState,
}

impl StateTransition {
    fn new(clock: Tick, process: &Process) -> Self {
        Self {
            node_id: process.node_id(),
            clock,
            process_id: process.id(),
            state: process.state(),
        }
    }
}

impl fmt::Display for StateTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:02}] {:05}: process {} {}",
            self.node_id, self.clock, self.process_id, self.state
        )
    }
}

pub struct NodeScheduler {
    node_id: usize,
    quantum: Tick,
    clock: Tick,
    next_process_id: usize,
    processes: Vec<Option<Process>>,
    ready_queue: PriorityQueue<i64, ProcessHandle>,
    blocked_queue: PriorityQueue<Tick, ProcessHandle>,
    running: Option<ProcessHandle>,
    remaining_quantum: Tick,
    tick_delay: Option<Duration>,
    transitions: Vec<StateTransition>,
}

impl NodeScheduler {
    pub fn new(node_id: usize, quantum: Tick) -> Self {
        Self {
            node_id,
            quantum,
            clock: 0,
            next_process_id: 1,
            processes: Vec::new(),
            ready_queue: PriorityQueue::new(),
            blocked_queue: PriorityQueue::new(),
            running: None,
            remaining_quantum: 0,
            tick_delay: None,
            transitions: Vec::new(),
        }
    }

    pub fn node_id(&self) -> usize {
        self.node_id
    }

    pub fn into_transitions(self) -> Vec<StateTransition> {
        self.transitions
    }

    /// Sleep for `delay` at the end of every tick. Only affects wall-clock speed.
    pub fn set_tick_delay(&mut self, delay: Duration) {
        self.tick_delay = Some(delay);
    }

    /// Nothing ready, blocked or running.
    pub fn is_idle(&self) -> bool {
        self.ready_queue.is_empty() && self.blocked_queue.is_empty() && self.running.is_none()
    }

    /// Give the process its per-node id and route it into its first operation.
    pub fn admit(
        &mut self,
        mut process: Process,
        finished: &FinishedAggregator,
    ) -> Result<ProcessHandle, SimulationError> {
        if process.node_id() != self.node_id {
            return Err(SimulationError::WrongNode {
                name: process.name().clone(),
                node_id: process.node_id(),
                expected: self.node_id,
            });
        }
        process.assign_id(self.next_process_id);
        self.next_process_id += 1;
        self.record_transition(&process);

        let handle = ProcessHandle(self.processes.len());
        self.processes.push(Some(process));
        self.route(handle, true, finished);
        Ok(handle)
    }

    pub fn run(&mut self, finished: &FinishedAggregator) {
        info!(
            "Node {} starts with {} ready and {} blocked processes",
            self.node_id,
            self.ready_queue.len(),
            self.blocked_queue.len()
        );
        while !self.is_idle() {
            let preempt = self.unblock(finished);
            self.update_running(preempt, finished);
            self.dispatch();
            if let Some(delay) = self.tick_delay {
                thread::sleep(delay);
            }
            self.clock += 1;
        }
        info!("Node {} is idle at tick {}", self.node_id, self.clock);
    }

    /// Wake every blocked process whose wake tick has come and report whether
    /// one of them is now ready and more urgent than the running process.
    fn unblock(&mut self, finished: &FinishedAggregator) -> bool {
        let running_key = self
            .running
            .and_then(|handle| self.processes[handle.0].as_ref())
            .map(Process::actual_priority);
        let mut preempt = false;

        while let Some((&wake_tick, _)) = self.blocked_queue.peek() {
            if wake_tick > self.clock {
                break;
            }
            let Some(handle) = self.blocked_queue.pop() else {
                break;
            };
            let ready_key = self.route(handle, true, finished);
            if let (Some(running_key), Some(ready_key)) = (running_key, ready_key) {
                preempt |= ready_key < running_key;
            }
        }
        preempt
    }

    fn update_running(&mut self, preempt: bool, finished: &FinishedAggregator) {
        let Some(handle) = self.running else {
            return;
        };
        let Some(process) = self.processes[handle.0].as_mut() else {
            warn!("Node {} lost its running process", self.node_id);
            self.running = None;
            return;
        };
        // Both budgets shrink even on a tick that ends in preemption.
        let completed = process.consume_tick();
        self.remaining_quantum = self.remaining_quantum.saturating_sub(1);

        if completed || self.remaining_quantum == 0 || preempt {
            self.running = None;
            self.route(handle, completed, finished);
        }
    }

    fn dispatch(&mut self) {
        if self.running.is_some() {
            return;
        }
        let Some(handle) = self.ready_queue.pop() else {
            return;
        };
        let clock = self.clock;
        let Some(process) = self.processes[handle.0].as_mut() else {
            warn!("Node {} dispatched a missing process", self.node_id);
            return;
        };
        process.enter_running(clock);
        let transition = StateTransition::new(clock, process);
        self.push_transition(transition);
        self.running = Some(handle);
        self.remaining_quantum = self.quantum;
    }

    /// Move the process to the queue its current operation asks for, after
    /// stepping to the next operation when `next_operation` is set. Returns the
    /// ready queue key when the process became ready.
    fn route(
        &mut self,
        handle: ProcessHandle,
        next_operation: bool,
        finished: &FinishedAggregator,
    ) -> Option<i64> {
        let Some(mut process) = self.processes.get_mut(handle.0).and_then(Option::take) else {
            warn!("Node {} has no process for {:?}", self.node_id, handle);
            return None;
        };
        if next_operation {
            process.advance();
        }

        let clock = self.clock;
        let ready_key = match process.current_operation() {
            Operation::Doop(_) => {
                process.enter_ready(clock);
                let key = process.actual_priority();
                self.ready_queue.push(handle, key);
                Some(key)
            }
            Operation::Block(_) => {
                process.enter_blocked(clock);
                self.blocked_queue.push(handle, process.wake_tick());
                None
            }
            Operation::Halt => {
                process.enter_finished(clock);
                self.record_transition(&process);
                finished.record(process);
                return None;
            }
        };
        self.record_transition(&process);
        self.processes[handle.0] = Some(process);
        ready_key
    }

    fn record_transition(&mut self, process: &Process) {
        let transition = StateTransition::new(self.clock, process);
        self.push_transition(transition);
    }

    fn push_transition(&mut self, transition: StateTransition) {
        debug!("{}", transition);
        self.transitions.push(transition);
    }
}
