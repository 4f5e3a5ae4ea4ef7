//! This module contains the process record, its lifecycle states and the operations of its program
use getset::{CopyGetters, Getters};
use std::fmt;

/// Discrete unit of simulated time.
pub type Tick = u64;

/// Longest DOOP or BLOCK a program may ask for, so that a remaining duration
/// always fits the `i64` ready queue key.
pub const MAX_DURATION: Tick = i64::MAX as Tick;

/// One instruction of a process program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Doop(Tick),
    Block(Tick),
    Halt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProcessState {
    #[default]
    New,
    Ready,
    Running,
    Blocked,
    Finished,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessState::New => "new",
            ProcessState::Ready => "ready",
            ProcessState::Running => "running",
            ProcessState::Blocked => "blocked",
            ProcessState::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Mutable per-process state plus the cursor over its program.
///
/// `remaining_duration` only has meaning while the current operation is a DOOP,
/// `wake_tick` only while the process is blocked.
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct Process {
    #[getset(get = "pub")]
    name: String,
    #[getset(get_copy = "pub")]
    node_id: usize,
    #[getset(get_copy = "pub")]
    id: usize,
    #[getset(get_copy = "pub")]
    priority: i32,
    program: Vec<Operation>,
    cursor: Option<usize>,
    #[getset(get_copy = "pub")]
    remaining_duration: Tick,
    #[getset(get_copy = "pub")]
    wake_tick: Tick,
    #[getset(get_copy = "pub")]
    state: ProcessState,
    #[getset(get_copy = "pub")]
    enqueue_time: Tick,
    #[getset(get_copy = "pub")]
    wait_time: Tick,
    #[getset(get_copy = "pub")]
    wait_count: u32,
    #[getset(get_copy = "pub")]
    finish_time: Tick,
    #[getset(get_copy = "pub")]
    run_time: Tick,
    #[getset(get_copy = "pub")]
    block_time: Tick,
}

impl Process {
    pub fn new(name: &str, priority: i32, node_id: usize, program: Vec<Operation>) -> Self {
        // Operations after the first HALT are unreachable and not counted.
        let (run_time, block_time) = program
            .iter()
            .take_while(|operation| **operation != Operation::Halt)
            .fold((0, 0), |(run, block): (Tick, Tick), operation| match *operation {
                Operation::Doop(ticks) => (run.saturating_add(ticks), block),
                Operation::Block(ticks) => (run, block.saturating_add(ticks)),
                Operation::Halt => (run, block),
            });
        Self {
            name: name.to_owned(),
            node_id,
            id: 0,
            priority,
            program,
            cursor: None,
            remaining_duration: 0,
            wake_tick: 0,
            state: ProcessState::New,
            enqueue_time: 0,
            wait_time: 0,
            wait_count: 0,
            finish_time: 0,
            run_time,
            block_time,
        }
    }

    pub fn program(&self) -> &[Operation] {
        &self.program
    }

    /// Operation under the cursor. A program that has not been started or has
    /// run off its end reads as `Halt`.
    pub fn current_operation(&self) -> Operation {
        self.cursor
            .and_then(|index| self.program.get(index))
            .copied()
            .unwrap_or(Operation::Halt)
    }

    /// Move to the next operation and load its compute duration.
    pub fn advance(&mut self) {
        let next = self.cursor.map_or(0, |index| index + 1);
        self.cursor = Some(next.min(self.program.len()));
        self.remaining_duration = match self.current_operation() {
            Operation::Doop(ticks) => ticks,
            Operation::Block(_) | Operation::Halt => 0,
        };
    }

    /// Ready queue key: remaining compute time under SJF (negative priority),
    /// the static priority otherwise. Smaller is more urgent.
    pub fn actual_priority(&self) -> i64 {
        if self.priority < 0 {
            i64::try_from(self.remaining_duration).unwrap_or(i64::MAX)
        } else {
            self.priority as i64
        }
    }

    pub(crate) fn assign_id(&mut self, id: usize) {
        self.id = id;
        self.state = ProcessState::New;
    }

    pub(crate) fn enter_ready(&mut self, clock: Tick) {
        self.state = ProcessState::Ready;
        self.wait_count += 1;
        self.enqueue_time = clock;
    }

    pub(crate) fn enter_running(&mut self, clock: Tick) {
        self.state = ProcessState::Running;
        self.wait_time += clock - self.enqueue_time;
    }

    pub(crate) fn enter_blocked(&mut self, clock: Tick) {
        let ticks = match self.current_operation() {
            Operation::Block(ticks) => ticks,
            Operation::Doop(_) | Operation::Halt => 0,
        };
        self.state = ProcessState::Blocked;
        self.wake_tick = clock.saturating_add(ticks);
    }

    pub(crate) fn enter_finished(&mut self, clock: Tick) {
        self.state = ProcessState::Finished;
        self.finish_time = clock;
    }

    /// Consume one tick of the current DOOP and report whether it is complete.
    pub(crate) fn consume_tick(&mut self) -> bool {
        self.remaining_duration = self.remaining_duration.saturating_sub(1);
        self.remaining_duration == 0
    }
}
