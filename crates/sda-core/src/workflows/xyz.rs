use super::{box_length, encounter_folder, load_sda_input, numbered_files, recreate_dir, trajectories_name};
use crate::core::io::pdb::write_pseudo_atoms_to_path;
use crate::core::io::read_structure;
use crate::core::io::trajectory::{Trajectory, TrajectoryLayout};
use crate::core::io::xyz::write_points_to_path;
use crate::engine::config::{ConfigError, FrameConfig};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::reframe::ligand_track;
use nalgebra::Vector3;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct XyzResult {
    pub xyz_folder: PathBuf,
    pub vmd_folder: PathBuf,
    /// Ligand points written per encounter file, in file order.
    pub frames: Vec<usize>,
}

/// Tracks the ligand centre in the protein frame for every encounter file.
///
/// Writes `folder_<ftrajectories>_xyz/<ftrajectories>_<n>_xyz` point files and a
/// pseudo-atom PDB per file in `folder_<ftrajectories>_vmd`.
#[instrument(skip_all, name = "xyz_workflow")]
pub fn run(config: &FrameConfig, reporter: &ProgressReporter) -> Result<XyzResult, EngineError> {
    // === Phase 1: Ligand template ===
    let ligand_pdb = config
        .ligand_pdb
        .as_ref()
        .ok_or(ConfigError::MissingParameter("ligand_pdb"))?;
    let template = reporter.phase("Loading structures", || -> Result<Vec<Vector3<f64>>, EngineError> {
        if let Some(protein_pdb) = &config.protein_pdb {
            let protein = read_structure(protein_pdb).map_err(|e| EngineError::format(protein_pdb, e))?;
            if let Some(c) = protein.center_of_geometry() {
                info!("Protein centre of geometry: ({:.3}, {:.3}, {:.3})", c.x, c.y, c.z);
            }
        }
        ligand_template(ligand_pdb)
    })?;

    let input = load_sda_input(&config.sda_input)?;
    let length = box_length(&input, &config.sda_input)?;
    let trajectories = trajectories_name(&input, &config.sda_input)?;
    let input_folder = encounter_folder(&config.workdir, &trajectories);
    let files = numbered_files(&input_folder, &trajectories)?;
    if files.is_empty() {
        warn!(folder = %input_folder.display(), "No encounter files to convert");
    }

    let xyz_folder = config.workdir.join(format!("folder_{}_xyz", trajectories));
    let vmd_folder = config.workdir.join(format!("folder_{}_vmd", trajectories));
    recreate_dir(&xyz_folder)?;
    recreate_dir(&vmd_folder)?;

    // === Phase 2: Ligand tracks ===
    reporter.report(Progress::PhaseStart {
        name: "Tracking ligand",
    });
    reporter.report(Progress::TaskStart {
        total_steps: files.len() as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let iterator = files.iter();

    #[cfg(feature = "parallel")]
    let iterator = files.par_iter();

    let frames: Vec<usize> = iterator
        .map(|(n, path)| -> Result<usize, EngineError> {
            let trajectory = Trajectory::from_path(path, TrajectoryLayout::Indexed)
                .map_err(|e| EngineError::format(path, e))?;
            let track = ligand_track(&trajectory.records, &template, length)?;
            write_points_to_path(&track, xyz_folder.join(format!("{}_{}_xyz", trajectories, n)))?;
            write_pseudo_atoms_to_path(&track, vmd_folder.join(format!("output_1_{}.pdb", n)))?;
            debug!(file = %path.display(), frames = track.len(), "Ligand track written");
            reporter.report(Progress::TaskIncrement);
            Ok(track.len())
        })
        .collect::<Result<_, _>>()?;

    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);
    info!(
        "Wrote {} ligand tracks ({} frames) into {}.",
        frames.len(),
        frames.iter().sum::<usize>(),
        xyz_folder.display()
    );
    Ok(XyzResult {
        xyz_folder,
        vmd_folder,
        frames,
    })
}

/// Ligand atoms relative to the ligand's centre of geometry.
fn ligand_template(path: &Path) -> Result<Vec<Vector3<f64>>, EngineError> {
    let ligand = read_structure(path).map_err(|e| EngineError::format(path, e))?;
    let center = ligand
        .center_of_geometry()
        .ok_or_else(|| EngineError::InvalidInput(format!("{} has no atoms", path.display())))?;
    Ok(ligand.body_frame(&center))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::xyz::read_points_from_path;
    use nalgebra::Point3;
    use std::fs;
    use tempfile::tempdir;

    const LIGAND: &str = "\
ATOM      1  C1  LIG A   1       9.000   0.000   0.000  1.00  0.00           C
ATOM      2  C2  LIG A   1      11.000   0.000   0.000  1.00  0.00           C
END
";

    fn record(frame: i64, solute: u32, x: f64) -> String {
        format!("1 {} {} {} 0.0 0.0 1 0 0 0 1 0", frame, solute, x)
    }

    #[test]
    fn writes_track_and_pseudo_atoms() {
        let dir = tempdir().unwrap();
        let work = dir.path();
        fs::write(work.join("sda.in"), "xmin = 0\nxmax = 100\nftrajectories = traj\n").unwrap();
        fs::write(work.join("p2.pdb"), LIGAND).unwrap();
        let folder = work.join("folder_traj");
        fs::create_dir(&folder).unwrap();
        let text = vec![
            "h".to_string(),
            "h".to_string(),
            record(1, 1, 10.0),
            record(1, 2, 15.0),
            record(2, 1, 10.0),
            record(2, 2, 98.0),
        ]
        .join("\n");
        fs::write(folder.join("traj_1"), text).unwrap();

        let config = FrameConfig {
            sda_input: work.join("sda.in"),
            workdir: work.to_path_buf(),
            ligand_pdb: Some(work.join("p2.pdb")),
            protein_pdb: None,
        };
        let result = run(&config, &ProgressReporter::new()).unwrap();
        assert_eq!(result.frames, vec![2]);

        let points = read_points_from_path(work.join("folder_traj_xyz/traj_1_xyz")).unwrap();
        assert_eq!(points[0], Point3::new(5.0, 0.0, 0.0));
        // 98 - 10 folds to -12 through the periodic boundary.
        assert_eq!(points[1], Point3::new(-12.0, 0.0, 0.0));
        let vmd = fs::read_to_string(work.join("folder_traj_vmd/output_1_1.pdb")).unwrap();
        assert_eq!(vmd.lines().count(), 2);
    }

    #[test]
    fn ligand_structure_is_required() {
        let config = FrameConfig {
            sda_input: "sda.in".into(),
            workdir: ".".into(),
            ligand_pdb: None,
            protein_pdb: None,
        };
        assert!(matches!(
            run(&config, &ProgressReporter::new()),
            Err(EngineError::Config(ConfigError::MissingParameter("ligand_pdb")))
        ));
    }
}
