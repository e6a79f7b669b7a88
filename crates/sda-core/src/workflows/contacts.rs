use super::{box_length, load_sda_input};
use crate::core::io::npy;
use crate::core::io::read_structure;
use crate::core::io::trajectory::{Trajectory, TrajectoryLayout};
use crate::engine::config::ContactsConfig;
use crate::engine::contacts::{ContactMonitor, ContactParameters, ContactSummary, merge_npy};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct ContactsResult {
    pub summary: ContactSummary,
    pub residue_contacts_file: PathBuf,
    pub bound_times_file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct MergeResult {
    pub output_file: PathBuf,
    pub files_merged: usize,
}

/// Counts contacts between one molecule and the crowders of a crowded run and writes
/// `crowd_residue_contacts_<trajectory>.npy` and `bounded_times_<trajectory>.npy`.
#[instrument(skip_all, name = "contacts_workflow")]
pub fn monitor(config: &ContactsConfig, reporter: &ProgressReporter) -> Result<ContactsResult, EngineError> {
    // === Phase 1: Inputs ===
    let input = load_sda_input(&config.sda_input)?;
    let total_solutes = input
        .total_solutes()
        .map_err(|e| EngineError::format(&config.sda_input, e))?;
    let length = box_length(&input, &config.sda_input)?;
    let molecule = read_structure(&config.molecule_pdb).map_err(|e| EngineError::format(&config.molecule_pdb, e))?;
    let crowder = read_structure(&config.crowder_pdb).map_err(|e| EngineError::format(&config.crowder_pdb, e))?;
    let trajectory = reporter.phase("Reading trajectory", || {
        Trajectory::from_path(&config.trajectory, TrajectoryLayout::Frame)
            .map_err(|e| EngineError::format(&config.trajectory, e))
    })?;
    info!(
        "Monitoring solute {} against {} crowders over {} records.",
        config.molecule_solute,
        total_solutes.saturating_sub(2),
        trajectory.records.len()
    );

    // === Phase 2: Contacts ===
    let mut contacts = ContactMonitor::new(
        &molecule,
        &crowder,
        total_solutes,
        ContactParameters {
            molecule_solute: config.molecule_solute,
            prescreen_distance: config.prescreen_distance,
            contact_distance: config.contact_distance,
            box_length: length,
        },
    )?;
    reporter.report(Progress::PhaseStart {
        name: "Counting contacts",
    });
    reporter.report(Progress::TaskStart {
        total_steps: trajectory.records.len() as u64,
    });
    for record in &trajectory.records {
        contacts.observe(record)?;
        reporter.report(Progress::TaskIncrement);
    }
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);
    let summary = contacts.finish();

    // === Phase 3: Arrays ===
    let name = trajectory_name(&config.trajectory)?;
    fs::create_dir_all(&config.output_folder)?;
    let residue_contacts_file = config
        .output_folder
        .join(format!("crowd_residue_contacts_{}.npy", name));
    let bound_times_file = config.output_folder.join(format!("bounded_times_{}.npy", name));
    npy::write_f64_to_path(&summary.residue_contacts, &residue_contacts_file)
        .map_err(|e| EngineError::format(&residue_contacts_file, e))?;
    npy::write_f64_to_path(&summary.bound_times, &bound_times_file)
        .map_err(|e| EngineError::format(&bound_times_file, e))?;

    info!(
        "{} contacts in {} bound episodes.",
        summary.contacts_per_solute.iter().sum::<u64>(),
        summary.bound_times.len()
    );
    Ok(ContactsResult {
        summary,
        residue_contacts_file,
        bound_times_file,
    })
}

/// Concatenates the `.npy` arrays of `folder` whose names contain `name`.
#[instrument(skip_all, name = "contacts_merge_workflow")]
pub fn merge(folder: &Path, name: &str) -> Result<MergeResult, EngineError> {
    let (output_file, files_merged) = merge_npy(folder, name)?;
    Ok(MergeResult {
        output_file,
        files_merged,
    })
}

fn trajectory_name(path: &Path) -> Result<String, EngineError> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| EngineError::InvalidInput(format!("'{}' is not a trajectory file", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::ContactsConfigBuilder;
    use tempfile::tempdir;

    const MOLECULE: &str = "\
ATOM      1  C1  MOL A   1       0.000   0.000   0.000  1.00  0.00           C
END
";
    const CROWDER: &str = "\
ATOM      1  C1  CRW A   1      -1.000   0.000   0.000  1.00  0.00           C
ATOM      2  C2  CRW A   2       1.000   0.000   0.000  1.00  0.00           C
END
";

    fn setup(dir: &Path) -> ContactsConfig {
        fs::write(dir.join("sdamm_crowd1.in"), "total_solutes = 2\nxmin = 0\nxmax = 100\n").unwrap();
        fs::write(dir.join("mol.pdb"), MOLECULE).unwrap();
        fs::write(dir.join("crowder.pdb"), CROWDER).unwrap();
        let mut text = String::from("header\nheader\n");
        for (frame, x) in [(0, 2.5), (1, 2.5), (2, 40.0)] {
            text.push_str(&format!("{} 1 0.0 0.0 0.0 1 0 0 0 1 0\n", frame));
            text.push_str(&format!("{} 2 {} 0.0 0.0 1 0 0 0 1 0\n", frame, x));
        }
        fs::write(dir.join("trajectories1"), text).unwrap();

        ContactsConfigBuilder::new()
            .sda_input(dir.join("sdamm_crowd1.in"))
            .trajectory(dir.join("trajectories1"))
            .molecule_pdb(dir.join("mol.pdb"))
            .crowder_pdb(dir.join("crowder.pdb"))
            .molecule_solute(1)
            .prescreen_distance(10.0)
            .contact_distance(2.0)
            .output_folder(dir.join("contacts"))
            .build()
            .unwrap()
    }

    #[test]
    fn writes_arrays_named_after_trajectory() {
        let dir = tempdir().unwrap();
        let config = setup(dir.path());
        let result = monitor(&config, &ProgressReporter::new()).unwrap();

        assert_eq!(
            result.bound_times_file,
            dir.path().join("contacts/bounded_times_trajectories1.npy")
        );
        assert_eq!(npy::read_f64_from_path(&result.bound_times_file).unwrap(), vec![2.0]);
        assert_eq!(
            npy::read_f64_from_path(&result.residue_contacts_file).unwrap(),
            vec![2.0, 0.0]
        );
    }

    #[test]
    fn merge_collects_monitor_outputs() {
        let dir = tempdir().unwrap();
        let config = setup(dir.path());
        monitor(&config, &ProgressReporter::new()).unwrap();
        let merged = merge(&config.output_folder, "bounded_times").unwrap();
        assert_eq!(merged.files_merged, 1);
        assert!(merged.output_file.ends_with("bounded_times_merged.npy"));
    }
}
