use lib::output_log::append_info_to_yaml;
use lib::simulation::SimulationReport;
use serde_derive::{Deserialize, Serialize};
use std::io;

#[derive(Serialize, Deserialize)]
struct ResultInfo {
    schedule_length: u64,
    finished_processes: usize,
    average_wait_time: f32,
}

pub fn dump_prosim_result_to_file(file_path: &str, report: &SimulationReport) -> io::Result<()> {
    let result_info = ResultInfo {
        schedule_length: report.schedule_length(),
        finished_processes: report.finished.len(),
        average_wait_time: report.average_wait_time(),
    };
    let yaml =
        serde_yaml::to_string(&result_info).expect("Failed to serialize prosim result to YAML");
    append_info_to_yaml(file_path, &yaml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib::{
        output_log::create_yaml_file,
        process::{Operation::*, Process},
        simulation::simulate,
    };
    use std::fs::remove_file;

    #[test]
    fn test_dump_prosim_result_to_file_normal() {
        let processes = vec![
            Process::new("a", 1, 1, vec![Doop(4), Halt]),
            Process::new("b", 1, 1, vec![Doop(2), Halt]),
            Process::new("c", 0, 2, vec![Block(3), Doop(1), Halt]),
        ];
        let report = simulate(2, 10, processes).unwrap();

        let file_path =
            create_yaml_file("../outputs", "test_dump_prosim_result_to_file_normal").unwrap();
        dump_prosim_result_to_file(&file_path, &report).unwrap();

        let file_contents = std::fs::read_to_string(&file_path).unwrap();
        let result_info: ResultInfo = serde_yaml::from_str(&file_contents).unwrap();

        assert_eq!(result_info.schedule_length, 6);
        assert_eq!(result_info.finished_processes, 3);
        assert_eq!(result_info.average_wait_time, 4.0 / 3.0);

        remove_file(file_path).unwrap();
    }
}
