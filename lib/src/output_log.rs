use log::info;
use serde_derive::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use crate::process::{Process, Tick};
use crate::simulation::{SimulationConfig, SimulationReport};

#[derive(Clone, Default, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessLog {
    pub node_id: usize,
    pub process_id: usize,
    pub name: String,
    pub finish_time: Tick,
    pub wait_time: Tick,
    pub wait_count: u32,
    pub run_time: Tick,
    pub block_time: Tick,
}

impl ProcessLog {
    pub fn new(process: &Process) -> Self {
        Self {
            node_id: process.node_id(),
            process_id: process.id(),
            name: process.name().clone(),
            finish_time: process.finish_time(),
            wait_time: process.wait_time(),
            wait_count: process.wait_count(),
            run_time: process.run_time(),
            block_time: process.block_time(),
        }
    }
}

#[derive(Clone, Default, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessLogs {
    pub process_logs: Vec<ProcessLog>,
}

#[derive(Clone, Default, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeLog {
    pub node_id: usize,
    pub processes: usize,
    pub last_finish_time: Tick,
}

#[derive(Clone, Default, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeLogs {
    pub node_logs: Vec<NodeLog>,
}

impl NodeLogs {
    pub fn new(report: &SimulationReport) -> Self {
        let mut node_logs: Vec<NodeLog> = (1..=report.config.node_count)
            .map(|node_id| NodeLog {
                node_id,
                ..Default::default()
            })
            .collect();
        for process in &report.finished {
            if let Some(node_log) = node_logs.get_mut(process.node_id() - 1) {
                node_log.processes += 1;
                node_log.last_finish_time = node_log.last_finish_time.max(process.finish_time());
            }
        }
        Self { node_logs }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationInfo {
    pub simulation_config: SimulationConfig,
}

/// Create (or truncate) `<folder_path>/<file_name>.yaml`, creating the folder first when needed.
pub fn create_yaml_file(folder_path: &str, file_name: &str) -> io::Result<String> {
    if !Path::new(folder_path).is_dir() {
        fs::create_dir_all(folder_path)?;
        info!("Created folder: {}", folder_path);
    }
    let file_path = format!("{}/{}.yaml", folder_path, file_name);
    fs::File::create(&file_path)?;
    Ok(file_path)
}

pub fn append_info_to_yaml(file_path: &str, info: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().append(true).create(true).open(file_path)?;
    file.write_all(info.as_bytes())
}

pub fn dump_simulation_info_to_yaml(file_path: &str, config: SimulationConfig) -> io::Result<()> {
    let simulation_info = SimulationInfo {
        simulation_config: config,
    };
    let yaml = serde_yaml::to_string(&simulation_info)
        .expect("Failed to serialize SimulationInfo to YAML");
    append_info_to_yaml(file_path, &yaml)
}

pub fn dump_process_logs_to_yaml(file_path: &str, finished: &[Process]) -> io::Result<()> {
    let process_logs = ProcessLogs {
        process_logs: finished.iter().map(ProcessLog::new).collect(),
    };
    let yaml =
        serde_yaml::to_string(&process_logs).expect("Failed to serialize ProcessLogs to YAML");
    append_info_to_yaml(file_path, &yaml)
}

pub fn dump_node_logs_to_yaml(file_path: &str, report: &SimulationReport) -> io::Result<()> {
    let yaml = serde_yaml::to_string(&NodeLogs::new(report))
        .expect("Failed to serialize NodeLogs to YAML");
    append_info_to_yaml(file_path, &yaml)
}

pub fn dump_simulation_report_to_yaml(
    file_path: &str,
    report: &SimulationReport,
) -> io::Result<()> {
    dump_simulation_info_to_yaml(file_path, report.config)?;
    dump_process_logs_to_yaml(file_path, &report.finished)?;
    dump_node_logs_to_yaml(file_path, report)
}

/// One statistics line per finished process, as printed at the end of a run.
pub fn format_process_stats(process: &Process) -> String {
    format!(
        "| {:05} | Proc {:02}.{:02} | Run {}, Block {}, Wait {}",
        process.finish_time(),
        process.node_id(),
        process.id(),
        process.run_time(),
        process.block_time(),
        process.wait_time()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Operation::*;
    use crate::simulation::simulate;
    use std::fs::remove_file;

    fn create_report() -> SimulationReport {
        let processes = vec![
            Process::new("a", 0, 1, vec![Doop(3), Block(2), Doop(1), Halt]),
            Process::new("b", 0, 1, vec![Doop(2), Halt]),
            Process::new("c", -1, 2, vec![Doop(4), Halt]),
        ];
        simulate(3, 2, processes).unwrap()
    }

    #[test]
    fn test_format_process_stats_normal() {
        let report = create_report();
        let lines: Vec<String> = report.finished.iter().map(format_process_stats).collect();
        assert_eq!(
            lines,
            vec![
                "| 00004 | Proc 01.02 | Run 2, Block 0, Wait 2",
                "| 00004 | Proc 02.01 | Run 4, Block 0, Wait 0",
                "| 00008 | Proc 01.01 | Run 4, Block 2, Wait 2",
            ]
        );
    }

    #[test]
    fn test_node_logs_new() {
        let report = create_report();
        let node_logs = NodeLogs::new(&report);
        assert_eq!(
            node_logs.node_logs,
            vec![
                NodeLog {
                    node_id: 1,
                    processes: 2,
                    last_finish_time: 8,
                },
                NodeLog {
                    node_id: 2,
                    processes: 1,
                    last_finish_time: 4,
                },
                NodeLog {
                    node_id: 3,
                    processes: 0,
                    last_finish_time: 0,
                },
            ]
        );
    }

    #[test]
    fn test_dump_process_logs_to_yaml_normal() {
        let report = create_report();
        let file_path =
            create_yaml_file("../outputs", "test_dump_process_logs_to_yaml_normal").unwrap();
        dump_process_logs_to_yaml(&file_path, &report.finished).unwrap();

        let file_contents = std::fs::read_to_string(&file_path).unwrap();
        let process_logs: ProcessLogs = serde_yaml::from_str(&file_contents).unwrap();

        assert_eq!(process_logs.process_logs.len(), 3);
        assert_eq!(process_logs.process_logs[0].name, "b");
        assert_eq!(process_logs.process_logs[0].wait_time, 2);
        assert_eq!(process_logs.process_logs[2].block_time, 2);
        assert_eq!(process_logs.process_logs[2].wait_count, 3);
        remove_file(file_path).unwrap();
    }

    #[test]
    fn test_dump_simulation_info_to_yaml_normal() {
        let file_path =
            create_yaml_file("../outputs", "test_dump_simulation_info_to_yaml_normal").unwrap();
        dump_simulation_info_to_yaml(&file_path, SimulationConfig::new(4, 2).unwrap()).unwrap();

        let file_contents = std::fs::read_to_string(&file_path).unwrap();
        let simulation_info: SimulationInfo = serde_yaml::from_str(&file_contents).unwrap();

        assert_eq!(simulation_info.simulation_config.quantum, 4);
        assert_eq!(simulation_info.simulation_config.node_count, 2);
        remove_file(file_path).unwrap();
    }

    #[test]
    fn test_create_yaml_file_reports_unusable_folder() {
        let blocker = create_yaml_file("../outputs", "test_create_yaml_file_blocker").unwrap();
        let result = create_yaml_file(&blocker, "nested");
        assert!(result.is_err());
        assert!(append_info_to_yaml(&format!("{}/nested.yaml", blocker), "x: 1\n").is_err());
        remove_file(blocker).unwrap();
    }
}
