use super::{box_length, encounter_folder, load_sda_input, numbered_files, recreate_dir, trajectories_name};
use crate::core::io::trajectory::{Trajectory, TrajectoryLayout, write_lines};
use crate::engine::config::FrameConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::reframe::align_records;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct AlignResult {
    pub output_folder: PathBuf,
    pub files: Vec<PathBuf>,
}

/// Rewrites every encounter file with the protein fixed at the origin, into
/// `folder_<ftrajectories>_center_sda/<ftrajectories>_<n>_center`.
#[instrument(skip_all, name = "align_workflow")]
pub fn run(config: &FrameConfig, reporter: &ProgressReporter) -> Result<AlignResult, EngineError> {
    let input = load_sda_input(&config.sda_input)?;
    let length = box_length(&input, &config.sda_input)?;
    let trajectories = trajectories_name(&input, &config.sda_input)?;

    let input_folder = encounter_folder(&config.workdir, &trajectories);
    let files = numbered_files(&input_folder, &trajectories)?;
    if files.is_empty() {
        warn!(folder = %input_folder.display(), "No encounter files to align");
    }
    let output_folder = config
        .workdir
        .join(format!("folder_{}_center_sda", trajectories));
    recreate_dir(&output_folder)?;

    reporter.report(Progress::PhaseStart {
        name: "Aligning encounters",
    });
    reporter.report(Progress::TaskStart {
        total_steps: files.len() as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let iterator = files.iter();

    #[cfg(feature = "parallel")]
    let iterator = files.par_iter();

    let written: Vec<PathBuf> = iterator
        .map(|(n, path)| -> Result<PathBuf, EngineError> {
            let output = output_folder.join(format!("{}_{}_center", trajectories, n));
            align_file(path, &output, length)?;
            reporter.report(Progress::TaskIncrement);
            Ok(output)
        })
        .collect::<Result<_, _>>()?;

    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);
    info!("Aligned {} encounter files into {}.", written.len(), output_folder.display());
    Ok(AlignResult {
        output_folder,
        files: written,
    })
}

fn align_file(input: &Path, output: &Path, box_length: f64) -> Result<(), EngineError> {
    let trajectory =
        Trajectory::from_path(input, TrajectoryLayout::Indexed).map_err(|e| EngineError::format(input, e))?;
    let lines = align_records(&trajectory.records, box_length).map_err(|e| match e {
        EngineError::InvalidInput(msg) => EngineError::InvalidInput(format!("{}: {}", input.display(), msg)),
        other => other,
    })?;
    write_lines(output, &trajectory.header, &lines)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn line(frame: i64, solute: u32, t: [f64; 3]) -> String {
        format!(
            "{:>6}{:>12}{:>6}  {:>7.3}  {:>7.3}  {:>7.3}   {:>6.3}   {:>6.3}   {:>6.3}   {:>6.3}   {:>6.3}   {:>6.3}   1.0",
            1, frame, solute, t[0], t[1], t[2], 1.0, 0.0, 0.0, 0.0, 1.0, 0.0
        )
    }

    #[test]
    fn aligns_every_numbered_encounter_file() {
        let dir = tempdir().unwrap();
        let work = dir.path();
        fs::write(work.join("sda.in"), "xmin = 0\nxmax = 100\nftrajectories = traj\n").unwrap();
        let folder = work.join("folder_traj");
        fs::create_dir(&folder).unwrap();
        for n in 1..=3 {
            let text = [
                "h1".to_string(),
                "h2".to_string(),
                line(10, 1, [20.0, 20.0, 20.0]),
                line(10, 2, [20.0 + n as f64, 20.0, 20.0]),
            ]
            .join("\n");
            fs::write(folder.join(format!("traj_{}", n)), text).unwrap();
        }

        let config = FrameConfig {
            sda_input: work.join("sda.in"),
            workdir: work.to_path_buf(),
            ligand_pdb: None,
            protein_pdb: None,
        };
        let result = run(&config, &ProgressReporter::new()).unwrap();
        assert_eq!(result.files.len(), 3);

        let aligned = fs::read_to_string(work.join("folder_traj_center_sda/traj_3_center")).unwrap();
        let lines: Vec<&str> = aligned.lines().collect();
        assert_eq!(lines[0], "h1");
        assert_eq!(&lines[2][26..33], "  0.000");
        assert_eq!(&lines[3][26..33], "  3.000");
    }
}
