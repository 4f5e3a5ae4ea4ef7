pub mod finished;
pub mod node_scheduler;
pub mod output_log;
pub mod prio_queue;
pub mod process;
pub mod program_loader;
pub mod simulation;
