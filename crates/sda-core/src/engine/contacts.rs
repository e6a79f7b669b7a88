use super::error::EngineError;
use crate::core::io::npy;
use crate::core::io::trajectory::TrajectoryRecord;
use crate::core::models::structure::Structure;
use crate::core::utils::geometry::{center_of_geometry, min_pair_distance};
use nalgebra::{Point3, Vector3};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactParameters {
    /// Solute number of the monitored molecule.
    pub molecule_solute: u32,
    /// Centre-to-centre distance below which atom pairs are checked.
    pub prescreen_distance: f64,
    /// Atom-pair distance that defines a contact.
    pub contact_distance: f64,
    pub box_length: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContactSummary {
    /// Contact count per crowder residue, indexed by residue ordinal.
    pub residue_contacts: Vec<f64>,
    /// Length in frames of every finished bound episode.
    pub bound_times: Vec<f64>,
    /// Contact count per solute (index `solute - 1`).
    pub contacts_per_solute: Vec<u64>,
}

/// Counts molecule-crowder contacts along a crowded trajectory.
///
/// Both templates are atom offsets from the structure's centre of mass. The scene is
/// shifted every frame so the molecule's centre of geometry sits in the middle of the
/// box; crowders are shifted by the same vector.
pub struct ContactMonitor {
    params: ContactParameters,
    molecule_body: Vec<Vector3<f64>>,
    crowder_body: Vec<Vector3<f64>>,
    crowder_residue: Vec<usize>,
    molecule: Option<(Vec<Point3<f64>>, Point3<f64>, Vector3<f64>)>,
    residue_contacts: Vec<f64>,
    contacts_per_solute: Vec<u64>,
    running: Vec<u64>,
    bound: Vec<bool>,
    bound_times: Vec<f64>,
    skipped: usize,
}

impl ContactMonitor {
    pub fn new(
        molecule: &Structure,
        crowder: &Structure,
        total_solutes: usize,
        params: ContactParameters,
    ) -> Result<Self, EngineError> {
        let molecule_com = molecule
            .center_of_mass()
            .ok_or_else(|| EngineError::InvalidInput("molecule structure has no atoms".into()))?;
        let crowder_com = crowder
            .center_of_mass()
            .ok_or_else(|| EngineError::InvalidInput("crowder structure has no atoms".into()))?;
        if params.molecule_solute == 0 || params.molecule_solute as usize > total_solutes {
            return Err(EngineError::InvalidInput(format!(
                "molecule solute {} outside 1..={}",
                params.molecule_solute, total_solutes
            )));
        }
        let crowder_residue: Vec<usize> = (0..crowder.len())
            .map(|i| crowder.residue_index(i).unwrap_or(0))
            .collect();
        let residues = crowder_residue.last().map_or(0, |last| last + 1);
        Ok(Self {
            params,
            molecule_body: molecule.body_frame(&molecule_com),
            crowder_body: crowder.body_frame(&crowder_com),
            crowder_residue,
            molecule: None,
            residue_contacts: vec![0.0; residues],
            contacts_per_solute: vec![0; total_solutes],
            running: vec![0; total_solutes],
            bound: vec![false; total_solutes],
            bound_times: Vec::new(),
            skipped: 0,
        })
    }

    pub fn observe(&mut self, record: &TrajectoryRecord) -> Result<(), EngineError> {
        let slot = (record.solute as usize)
            .checked_sub(1)
            .filter(|&s| s < self.bound.len())
            .ok_or_else(|| {
                EngineError::InvalidInput(format!(
                    "solute {} in frame {} exceeds the {} solutes of the run",
                    record.solute,
                    record.frame,
                    self.bound.len()
                ))
            })?;

        if record.solute == self.params.molecule_solute {
            let placed = record.pose.place_all(&self.molecule_body);
            let center = center_of_geometry(&placed)
                .ok_or_else(|| EngineError::InvalidInput("molecule template is empty".into()))?;
            let shift = Vector3::repeat(self.params.box_length / 2.0) - center.coords;
            let placed: Vec<Point3<f64>> = placed.iter().map(|p| p + shift).collect();
            self.molecule = Some((placed, center + shift, shift));
            return Ok(());
        }
        if record.solute <= 1 {
            return Ok(());
        }

        if self.molecule.is_none() {
            self.skipped += 1;
            if self.skipped == 1 {
                warn!(frame = record.frame, "Crowder record before the first molecule record, skipping");
            }
            return Ok(());
        }
        let Some((molecule, molecule_center, shift)) = &self.molecule else {
            return Ok(());
        };
        let (molecule_center, shift) = (*molecule_center, *shift);

        let crowder: Vec<Point3<f64>> = record
            .pose
            .place_all(&self.crowder_body)
            .into_iter()
            .map(|p| p + shift)
            .collect();
        let crowder_center = center_of_geometry(&crowder)
            .ok_or_else(|| EngineError::InvalidInput("crowder template is empty".into()))?;

        if (crowder_center - molecule_center).norm() < self.params.prescreen_distance {
            let closest = min_pair_distance(molecule, &crowder)
                .ok_or_else(|| EngineError::Internal("no atom pairs to compare".into()))?;
            if closest.distance <= self.params.contact_distance {
                let residue = self.crowder_residue[closest.index_b];
                self.residue_contacts[residue] += 1.0;
                self.contacts_per_solute[slot] += 1;
                self.running[slot] += 1;
                self.bound[slot] = true;
                trace!(frame = record.frame, solute = record.solute, residue, "Contact");
            } else {
                self.close_episode(slot);
            }
        } else {
            self.close_episode(slot);
        }
        Ok(())
    }

    fn close_episode(&mut self, slot: usize) {
        if self.bound[slot] {
            self.bound_times.push(self.running[slot] as f64);
            self.bound[slot] = false;
            self.running[slot] = 0;
        }
    }

    /// Episodes still open at the end of the trajectory are not counted.
    pub fn finish(self) -> ContactSummary {
        if self.skipped > 0 {
            warn!(records = self.skipped, "Records skipped before the first molecule record");
        }
        debug!(episodes = self.bound_times.len(), "Contact monitoring finished");
        ContactSummary {
            residue_contacts: self.residue_contacts,
            bound_times: self.bound_times,
            contacts_per_solute: self.contacts_per_solute,
        }
    }
}

/// Concatenates every `.npy` file in `folder` whose name contains `name` (in file-name
/// order) into `<folder>/<name>_merged.npy`. Earlier merge outputs are ignored.
pub fn merge_npy(folder: &Path, name: &str) -> Result<(PathBuf, usize), EngineError> {
    let mut files: Vec<PathBuf> = fs::read_dir(folder)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path.extension().is_some_and(|ext| ext == "npy")
                && path.file_name().is_some_and(|f| {
                    let f = f.to_string_lossy();
                    f.contains(name) && !f.contains("_merged")
                })
        })
        .collect();
    files.sort();

    let mut merged = Vec::new();
    for file in &files {
        let values = npy::read_f64_from_path(file).map_err(|e| EngineError::format(file, e))?;
        merged.extend(values);
    }
    let output = folder.join(format!("{}_merged.npy", name));
    npy::write_f64_to_path(&merged, &output).map_err(|e| EngineError::format(&output, e))?;
    info!(files = files.len(), values = merged.len(), output = %output.display(), "Merged arrays");
    Ok((output, files.len()))
}
