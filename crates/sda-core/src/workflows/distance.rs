use super::{box_length, check_figure, load_sda_input};
use crate::core::io::figures::{self, Labels};
use crate::core::io::read_structure;
use crate::core::io::table::{self, float_repr};
use crate::core::io::trajectory::{Trajectory, TrajectoryLayout};
use crate::engine::config::ReactionConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;
use crate::engine::reaction::{minimum_distances, reaction_template, read_reaction_atoms};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::PathBuf;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct DistanceResult {
    /// One minimum per frame, in Å.
    pub minima: Vec<f64>,
    pub table: PathBuf,
    pub histogram: PathBuf,
}

/// Minimum distance between the protein's reaction atoms and any crowder, per frame.
#[instrument(skip_all, name = "reaction_distance_workflow")]
pub fn run(config: &ReactionConfig, reporter: &ProgressReporter) -> Result<DistanceResult, EngineError> {
    let input = load_sda_input(&config.sda_input)?;
    let length = box_length(&input, &config.sda_input)?;
    let total_solutes = input
        .total_solutes()
        .map_err(|e| EngineError::format(&config.sda_input, e))?;
    let total_solutes = u32::try_from(total_solutes)
        .map_err(|_| EngineError::InvalidInput(format!("total_solutes {} is too large", total_solutes)))?;

    // === Phase 1: Reaction atoms ===
    let atoms = read_reaction_atoms(BufReader::new(File::open(&config.reaction_file)?))?;
    if atoms.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "no reaction atoms in {}",
            config.reaction_file.display()
        )));
    }
    let protein = read_structure(&config.protein).map_err(|e| EngineError::format(&config.protein, e))?;
    let template = reaction_template(&protein, &atoms)?;
    info!("{} reaction atoms on a protein of {} atoms.", template.len(), protein.len());

    // === Phase 2: Minimum distances ===
    let minima = reporter.phase("Measuring distances", || -> Result<Vec<f64>, EngineError> {
        let trajectory = Trajectory::from_path(&config.trajectory, TrajectoryLayout::Indexed)
            .map_err(|e| EngineError::format(&config.trajectory, e))?;
        Ok(minimum_distances(&trajectory.records, &template, length, total_solutes))
    })?;
    if minima.is_empty() {
        warn!(trajectory = %config.trajectory.display(), "No complete frames in trajectory");
    }

    // === Phase 3: Outputs ===
    let name = config
        .trajectory
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "trajectory".to_string());
    fs::create_dir_all(&config.output_folder)?;
    let table_path = config.output_folder.join(format!("min_distances_{}.txt", name));
    table::write_rows_to_path(&table_path, minima.iter().map(|d| vec![float_repr(*d)]))
        .map_err(|e| EngineError::format(&table_path, e))?;
    let histogram = config.output_folder.join(format!("min_distances_{}.svg", name));
    check_figure(
        &histogram,
        figures::histogram(
            &histogram,
            Labels {
                title: "Minimum crowder distance to reaction atoms",
                x: "distance [Ang]",
                y: "frames",
            },
            &minima,
            config.bins,
        ),
    )?;

    info!(
        "{} frames, closest approach {:.3} Ang.",
        minima.len(),
        minima.iter().copied().fold(f64::INFINITY, f64::min)
    );
    Ok(DistanceResult {
        minima,
        table: table_path,
        histogram,
    })
}
