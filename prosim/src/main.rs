mod outputs_result;

use chrono::{DateTime, Utc};
use clap::Parser;
use lib::output_log::*;
use lib::program_loader::{load_simulation, load_simulation_from_file, LoadError, SimulationInput};
use lib::simulation::{Simulation, SimulationError, SimulationReport};
use log::{error, info};
use outputs_result::dump_prosim_result_to_file;
use std::error::Error;
use std::io::{self, Read};
use std::process::ExitCode;

#[derive(Parser)]
#[clap(
    name = "prosim",
    version = "v1.0.0",
    about = "About:
    Simulates preemptive priority and shortest-job-first scheduling on independent nodes.
    The input starts with `<process count> <quantum> <node count>`,
    followed by one `<name> <program size> <priority> <node>` block per process."
)]
struct ArgParser {
    ///Path to the simulation description. Standard input is read when omitted.
    #[clap(short = 'i', long = "input_file_path", required = false)]
    input_file_path: Option<String>,
    ///Path to output directory. A YAML log is written there when given.
    #[clap(short = 'o', long = "output_dir_path", required = false)]
    output_dir_path: Option<String>,
    ///Only print the per-process statistics, not the state transitions.
    #[clap(short = 'q', long = "quiet")]
    quiet: bool,
}

fn load_input(arg: &ArgParser) -> Result<SimulationInput, LoadError> {
    match &arg.input_file_path {
        Some(input_file_path) => load_simulation_from_file(input_file_path),
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .map_err(|source| LoadError::Io {
                    path: "<stdin>".to_owned(),
                    source,
                })?;
            load_simulation(&text)
        }
    }
}

fn print_report(report: &SimulationReport, quiet: bool) {
    if !quiet {
        for transition in &report.transitions {
            println!("{}", transition);
        }
    }
    for process in &report.finished {
        println!("{}", format_process_stats(process));
    }
}

fn dump_report(output_dir_path: &str, report: &SimulationReport) -> io::Result<String> {
    let now: DateTime<Utc> = Utc::now();
    let date = now.format("%Y-%m-%d-%H-%M-%S").to_string();
    let file_name = format!("{}-prosim-log", date);
    let file_path = create_yaml_file(output_dir_path, &file_name)?;
    dump_prosim_result_to_file(&file_path, report)?;
    dump_simulation_report_to_yaml(&file_path, report)?;
    Ok(file_path)
}

/// Prefix of the message printed on stderr when a run fails.
fn error_prefix(err: &(dyn Error + 'static)) -> &'static str {
    if let Some(SimulationError::WorkerPanicked(_)) = err.downcast_ref::<SimulationError>() {
        "Simulation failed"
    } else if err.downcast_ref::<io::Error>().is_some() {
        "Failed to write output"
    } else {
        "Bad input"
    }
}

fn run(arg: &ArgParser) -> Result<(), Box<dyn Error>> {
    let input = load_input(arg)?;
    let mut simulation = Simulation::new(input.config);
    for process in input.processes {
        simulation.admit(process)?;
    }
    let report = simulation.simulate()?;

    print_report(&report, arg.quiet);
    if let Some(output_dir_path) = &arg.output_dir_path {
        let file_path = dump_report(output_dir_path, &report)?;
        info!("Wrote simulation log to {}", file_path);
    }
    Ok(())
}

/// Application main function
fn main() -> ExitCode {
    env_logger::init();
    let arg: ArgParser = ArgParser::parse();
    match run(&arg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            eprintln!("{}: {}", error_prefix(err.as_ref()), err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_prefix() {
        let panicked: Box<dyn Error> = Box::new(SimulationError::WorkerPanicked(2));
        assert_eq!(error_prefix(panicked.as_ref()), "Simulation failed");

        let out_of_range: Box<dyn Error> = Box::new(SimulationError::NoNodes);
        assert_eq!(error_prefix(out_of_range.as_ref()), "Bad input");

        let unparsable: Box<dyn Error> = Box::new(load_simulation("1 x 1\n").unwrap_err());
        assert_eq!(error_prefix(unparsable.as_ref()), "Bad input");

        let unwritable: Box<dyn Error> =
            Box::new(io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(error_prefix(unwritable.as_ref()), "Failed to write output");
    }

    #[test]
    fn test_dump_report_into_unusable_directory() {
        let report = lib::simulation::simulate(1, 2, Vec::new()).unwrap();
        let blocker = create_yaml_file("../outputs", "test_dump_report_blocker").unwrap();
        assert!(dump_report(&blocker, &report).is_err());
        std::fs::remove_file(blocker).unwrap();
    }
}
