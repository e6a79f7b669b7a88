use super::{box_length, encounter_folder, load_sda_input, recreate_dir, trajectories_name};
use crate::core::io::complexes::first_encounters_from_path;
use crate::core::io::read_structure;
use crate::core::io::trajectory::{Trajectory, TrajectoryLayout, write_lines};
use crate::engine::config::EncounterConfig;
use crate::engine::encounter::{extract_encounters, select_encounter_files};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct EncounterResult {
    pub output_folder: PathBuf,
    /// Written files, `<ftrajectories>_1` onwards.
    pub files: Vec<PathBuf>,
    /// Trajectories listed in the complexes file.
    pub encounters_found: usize,
}

/// Cuts the approach of every encountered trajectory out of an association run.
///
/// `fcomplexes` and `ftrajectories` are taken from the SDA input and resolved against
/// the working directory; the sub-trajectories land in `folder_<ftrajectories>`.
#[instrument(skip_all, name = "encounter_workflow")]
pub fn run(config: &EncounterConfig, reporter: &ProgressReporter) -> Result<EncounterResult, EngineError> {
    // === Phase 1: Read inputs ===
    reporter.report(Progress::PhaseStart { name: "Reading inputs" });
    let input = load_sda_input(&config.sda_input)?;
    let length = box_length(&input, &config.sda_input)?;
    let trajectories = trajectories_name(&input, &config.sda_input)?;
    let complexes_path = config.workdir.join(
        input
            .complexes_file()
            .map_err(|e| EngineError::format(&config.sda_input, e))?,
    );
    let trajectory_path = config.workdir.join(
        input
            .trajectories_file()
            .map_err(|e| EngineError::format(&config.sda_input, e))?,
    );

    log_centre("Protein", &config.protein_pdb)?;
    log_centre("Ligand", &config.ligand_pdb)?;

    let encounters =
        first_encounters_from_path(&complexes_path).map_err(|e| EngineError::format(&complexes_path, e))?;
    info!("Found {} encountered trajectories in {}.", encounters.len(), complexes_path.display());
    let trajectory = Trajectory::from_path(&trajectory_path, TrajectoryLayout::Indexed)
        .map_err(|e| EngineError::format(&trajectory_path, e))?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Extract and write sub-trajectories ===
    reporter.report(Progress::PhaseStart {
        name: "Extracting encounters",
    });
    let extracted = extract_encounters(&trajectory.records, &encounters, length, config.cutoff);
    if extracted.len() < encounters.len() {
        warn!(
            "{} encountered trajectories produced no sub-trajectory.",
            encounters.len() - extracted.len()
        );
    }

    let output_folder = encounter_folder(&config.workdir, &trajectories);
    recreate_dir(&output_folder)?;
    reporter.report(Progress::TaskStart {
        total_steps: extracted.len() as u64,
    });
    let mut files = Vec::with_capacity(extracted.len());
    for (n, encounter) in extracted.iter().enumerate() {
        let path = output_folder.join(format!("{}_{}", trajectories, n + 1));
        write_lines(&path, &trajectory.header, &encounter.lines)?;
        debug!(traj = encounter.traj, file = %path.display(), "Encounter written");
        files.push(path);
        reporter.report(Progress::TaskIncrement);
    }
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    info!("Wrote {} encounter trajectories to {}.", files.len(), output_folder.display());
    Ok(EncounterResult {
        output_folder,
        files,
        encounters_found: encounters.len(),
    })
}

fn log_centre(label: &str, path: &Path) -> Result<(), EngineError> {
    let structure = read_structure(path).map_err(|e| EngineError::format(path, e))?;
    match structure.center_of_geometry() {
        Some(c) => info!("{} centre of geometry: ({:.3}, {:.3}, {:.3})", label, c.x, c.y, c.z),
        None => warn!(file = %path.display(), "{} structure has no atoms", label),
    }
    Ok(())
}

/// Names of the complexes files holding at least one complex, with `strip` removed.
/// Input order is kept.
#[instrument(skip_all, name = "encounter_selection")]
pub fn select(files: &[PathBuf], total_solutes: usize, strip: &str) -> Result<Vec<String>, EngineError> {
    #[cfg(not(feature = "parallel"))]
    let iterator = files.iter();

    #[cfg(feature = "parallel")]
    let iterator = files.par_iter();

    let selected: Vec<Vec<String>> = iterator
        .map(|file| select_encounter_files(std::slice::from_ref(file), total_solutes, strip))
        .collect::<Result<_, _>>()?;
    let selected: Vec<String> = selected.into_iter().flatten().collect();
    info!("{} of {} complexes files hold encounters.", selected.len(), files.len());
    Ok(selected)
}
