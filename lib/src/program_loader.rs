//! Build process records from a textual simulation description
use crate::process::{Operation, Process, Tick, MAX_DURATION};
use crate::simulation::{SimulationConfig, SimulationError};

use log::{info, warn};
use std::fs;
use thiserror::Error;

/// Most operations one process may have once its loops are unrolled.
pub const MAX_PROGRAM_LEN: usize = 100_000;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Unexpected end of input, expecting {0}")]
    UnexpectedEnd(&'static str),
    #[error("Line {line}: expecting {expected}, found `{found}`")]
    InvalidNumber {
        line: usize,
        expected: &'static str,
        found: String,
    },
    #[error("Line {line}: unknown primitive `{found}`")]
    UnknownPrimitive { line: usize, found: String },
    #[error("Line {line}: END without matching LOOP")]
    UnmatchedEnd { line: usize },
    #[error("Process `{name}`: LOOP without matching END")]
    UnterminatedLoop { name: String },
    #[error("Line {line}: DOOP duration must be positive")]
    ZeroDoop { line: usize },
    #[error("Line {line}: duration {found} exceeds the maximum of {}", MAX_DURATION)]
    DurationTooLarge { line: usize, found: Tick },
    #[error("Process `{name}`: more than {} operations after unrolling loops", MAX_PROGRAM_LEN)]
    ProgramTooLong { name: String },
    #[error(transparent)]
    Config(#[from] SimulationError),
}

/// Everything read from one simulation description.
#[derive(Debug)]
pub struct SimulationInput {
    pub config: SimulationConfig,
    pub processes: Vec<Process>,
}

struct Token<'a> {
    line: usize,
    text: &'a str,
}

struct Tokens<'a> {
    tokens: std::vec::IntoIter<Token<'a>>,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        let tokens = text
            .lines()
            .enumerate()
            .flat_map(|(index, line)| {
                let content = line.split('#').next().unwrap_or_default();
                content
                    .split_whitespace()
                    .map(move |text| Token {
                        line: index + 1,
                        text,
                    })
            })
            .collect::<Vec<_>>();
        Self {
            tokens: tokens.into_iter(),
        }
    }

    fn next_token(&mut self, expected: &'static str) -> Result<Token<'a>, LoadError> {
        self.tokens.next().ok_or(LoadError::UnexpectedEnd(expected))
    }

    fn next_number<T: std::str::FromStr>(
        &mut self,
        expected: &'static str,
    ) -> Result<(usize, T), LoadError> {
        let token = self.next_token(expected)?;
        token
            .text
            .parse::<T>()
            .map(|value| (token.line, value))
            .map_err(|_| LoadError::InvalidNumber {
                line: token.line,
                expected,
                found: token.text.to_owned(),
            })
    }
}

/// load a simulation description and return its configuration and processes
///
/// # Arguments
///
/// *  `text` - the description: a header `<process count> <quantum> <node count>`
///    followed by one block per process, `<name> <program size> <priority> <node>`
///    and then `<program size>` primitives (`DOOP n`, `BLOCK n`, `LOOP n`, `END`, `HALT`)
///
/// # Returns
///
/// *  `SimulationInput` - validated configuration and processes in input order
///
/// # Example
///
/// ```
/// use prosim_lib::program_loader::load_simulation;
///
/// let input = "1 5 1\nsolo 2 0 1\nDOOP 5\nHALT\n";
/// let loaded = load_simulation(input).unwrap();
/// assert_eq!(loaded.config.quantum, 5);
/// assert_eq!(loaded.processes[0].run_time(), 5);
/// ```
pub fn load_simulation(text: &str) -> Result<SimulationInput, LoadError> {
    let mut tokens = Tokens::new(text);
    let (_, process_count) = tokens.next_number::<usize>("number of processes")?;
    let (_, quantum) = tokens.next_number::<Tick>("quantum size")?;
    let (_, node_count) = tokens.next_number::<usize>("number of nodes")?;
    let config = SimulationConfig::new(quantum, node_count)?;

    let mut processes = Vec::new();
    for _ in 0..process_count {
        let process = load_process(&mut tokens)?;
        if process.node_id() == 0 || process.node_id() > node_count {
            return Err(SimulationError::NodeOutOfRange {
                name: process.name().clone(),
                node_id: process.node_id(),
                node_count,
            }
            .into());
        }
        processes.push(process);
    }

    if tokens.tokens.next().is_some() {
        warn!("Ignoring input after the {} announced processes", process_count);
    }
    info!(
        "Loaded {} processes for {} nodes with quantum {}",
        processes.len(),
        node_count,
        quantum
    );
    Ok(SimulationInput { config, processes })
}

pub fn load_simulation_from_file(file_path: &str) -> Result<SimulationInput, LoadError> {
    let text = fs::read_to_string(file_path).map_err(|source| LoadError::Io {
        path: file_path.to_owned(),
        source,
    })?;
    load_simulation(&text)
}

fn load_process(tokens: &mut Tokens) -> Result<Process, LoadError> {
    let name = tokens.next_token("process name")?.text;
    let (_, size) = tokens.next_number::<usize>("program size")?;
    let (_, priority) = tokens.next_number::<i32>("priority")?;
    let (_, node_id) = tokens.next_number::<usize>("node")?;

    let mut program = Vec::with_capacity(size.min(MAX_PROGRAM_LEN));
    // (iterations, start of the loop body in `program`)
    let mut loops: Vec<(usize, usize)> = Vec::new();
    for _ in 0..size {
        let token = tokens.next_token("primitive")?;
        match token.text.to_ascii_uppercase().as_str() {
            "DOOP" => {
                let (line, ticks) = tokens.next_number::<Tick>("DOOP duration")?;
                if ticks == 0 {
                    return Err(LoadError::ZeroDoop { line });
                }
                program.push(Operation::Doop(check_duration(line, ticks)?));
            }
            "BLOCK" => {
                let (line, ticks) = tokens.next_number::<Tick>("BLOCK duration")?;
                program.push(Operation::Block(check_duration(line, ticks)?));
            }
            "LOOP" => {
                let (_, iterations) = tokens.next_number::<usize>("LOOP count")?;
                loops.push((iterations, program.len()));
            }
            "END" => {
                let (iterations, start) = loops
                    .pop()
                    .ok_or(LoadError::UnmatchedEnd { line: token.line })?;
                unroll_loop(&mut program, start, iterations).ok_or_else(|| {
                    LoadError::ProgramTooLong {
                        name: name.to_owned(),
                    }
                })?;
            }
            "HALT" => program.push(Operation::Halt),
            _ => {
                return Err(LoadError::UnknownPrimitive {
                    line: token.line,
                    found: token.text.to_owned(),
                })
            }
        }
    }
    if !loops.is_empty() {
        return Err(LoadError::UnterminatedLoop {
            name: name.to_owned(),
        });
    }
    if program.last() != Some(&Operation::Halt) {
        warn!("Process {} does not end with HALT", name);
    }
    Ok(Process::new(name, priority, node_id, program))
}

fn check_duration(line: usize, ticks: Tick) -> Result<Tick, LoadError> {
    if ticks > MAX_DURATION {
        return Err(LoadError::DurationTooLarge { line, found: ticks });
    }
    Ok(ticks)
}

/// Replace the body starting at `start` with `iterations` copies of itself.
/// Returns `None`, leaving `program` untouched, when the result would exceed
/// `MAX_PROGRAM_LEN`.
fn unroll_loop(program: &mut Vec<Operation>, start: usize, iterations: usize) -> Option<()> {
    let body_len = program.len() - start;
    let unrolled_len = body_len
        .checked_mul(iterations)?
        .checked_add(start)
        .filter(|len| *len <= MAX_PROGRAM_LEN)?;
    let body = program.split_off(start);
    program.reserve(unrolled_len - start);
    for _ in 0..iterations {
        program.extend_from_slice(&body);
    }
    Some(())
}
