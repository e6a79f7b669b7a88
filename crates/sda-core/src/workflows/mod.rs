//! # Workflows Module
//!
//! End-to-end procedures behind the `sdatools` commands. Each workflow loads its
//! inputs, drives the [`crate::engine`] algorithms and writes the conventional output
//! folders, so the tools chain purely by folder naming.
//!
//! ## Architecture
//!
//! - **Trajectory post-processing** ([`diffusion`], [`encounters`], [`align`], [`xyz`]) -
//!   MSD fits over crowded runs, encounter sub-trajectories and their ligand-centred
//!   rewrites
//! - **Markov state models** ([`msm`], [`validate`]) - building one model from the
//!   ligand tracks and checking its lag-time behaviour
//! - **Crowder statistics** ([`contacts`], [`distance`])
//! - **Structures** ([`assemble`], [`hydro`], [`transform`]) - bounded complexes, their
//!   diffusion summary and rigid-body moves of a PDB file
//!
//! Every workflow reports phases through a [`crate::engine::progress::ProgressReporter`]
//! and returns a small result struct describing what it wrote.

pub mod align;
pub mod assemble;
pub mod contacts;
pub mod diffusion;
pub mod distance;
pub mod encounters;
pub mod hydro;
pub mod msm;
pub mod transform;
pub mod validate;
pub mod xyz;

use crate::core::io::figures::FigureError;
use crate::core::io::sda_input::SdaInput;
use crate::engine::error::EngineError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Removes `path` if it exists and creates it again, empty.
pub(crate) fn recreate_dir(path: &Path) -> Result<(), EngineError> {
    if path.exists() {
        debug!(path = %path.display(), "Removing previous output folder");
        fs::remove_dir_all(path)?;
    }
    fs::create_dir_all(path)?;
    Ok(())
}

/// Regular files in `folder` whose name contains `filter`, sorted by path.
pub(crate) fn files_containing(folder: &Path, filter: &str) -> Result<Vec<PathBuf>, EngineError> {
    let mut files: Vec<PathBuf> = fs::read_dir(folder)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .is_some_and(|name| name.to_string_lossy().contains(filter))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Files named exactly `<prefix>_<n>` in `folder`, ordered by `n`.
pub(crate) fn numbered_files(folder: &Path, prefix: &str) -> Result<Vec<(u64, PathBuf)>, EngineError> {
    let mut files: Vec<(u64, PathBuf)> = fs::read_dir(folder)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter_map(|path| {
            let number = path
                .file_name()?
                .to_str()?
                .strip_prefix(prefix)?
                .strip_prefix('_')?
                .parse()
                .ok()?;
            Some((number, path))
        })
        .collect();
    files.sort_by_key(|(n, _)| *n);
    Ok(files)
}

pub(crate) fn load_sda_input(path: &Path) -> Result<SdaInput, EngineError> {
    SdaInput::from_path(path).map_err(|e| EngineError::format(path, e))
}

/// Name of the trajectory file, which prefixes every output folder of the
/// encounter tools (`folder_<name>`, `folder_<name>_center_sda`, ...).
pub(crate) fn trajectories_name(input: &SdaInput, sda_path: &Path) -> Result<String, EngineError> {
    let file = input
        .trajectories_file()
        .map_err(|e| EngineError::format(sda_path, e))?;
    file.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            EngineError::InvalidInput(format!("ftrajectories '{}' is not a file name", file.display()))
        })
}

pub(crate) fn box_length(input: &SdaInput, sda_path: &Path) -> Result<f64, EngineError> {
    input.box_length().map_err(|e| EngineError::format(sda_path, e))
}

/// Encounter files written by the extraction tool, `folder_<name>/<name>_<n>`.
pub(crate) fn encounter_folder(workdir: &Path, trajectories: &str) -> PathBuf {
    workdir.join(format!("folder_{}", trajectories))
}

/// A figure with nothing to draw is skipped with a warning; other drawing
/// failures are errors.
pub(crate) fn check_figure(path: &Path, drawn: Result<(), FigureError>) -> Result<(), EngineError> {
    match drawn {
        Ok(()) => Ok(()),
        Err(FigureError::NoData(what)) => {
            warn!(figure = %path.display(), "No data for the {} figure, skipping", what);
            Ok(())
        }
        Err(e) => Err(EngineError::format(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn numbered_files_sort_numerically_and_skip_others() {
        let dir = tempdir().unwrap();
        for name in ["traj_10", "traj_2", "traj_1", "traj_x", "traj_3_center", "other_4"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let files = numbered_files(dir.path(), "traj").unwrap();
        let numbers: Vec<u64> = files.iter().map(|(n, _)| *n).collect();
        assert_eq!(numbers, vec![1, 2, 10]);
    }

    #[test]
    fn recreate_dir_empties_existing_folder() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();
        fs::write(out.join("stale"), "x").unwrap();
        recreate_dir(&out).unwrap();
        assert!(out.is_dir());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn files_containing_filters_by_name() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b_trajectories_1_xyz"), "").unwrap();
        fs::write(dir.path().join("a_trajectories_1_xyz"), "").unwrap();
        fs::write(dir.path().join("trajectories_2_xyz"), "").unwrap();
        let files = files_containing(dir.path(), "trajectories_1").unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a_trajectories_1_xyz"));
    }
}
