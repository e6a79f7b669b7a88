use super::error::EngineError;
use crate::core::io::trajectory::TrajectoryRecord;
use crate::core::models::structure::Structure;
use crate::core::utils::geometry::pbc_distance;
use nalgebra::{Point3, Vector3};
use std::collections::HashSet;
use std::io::BufRead;
use tracing::{debug, warn};

/// 1-based atom indices named in the third column of a reaction-criteria file, in
/// first-occurrence order without duplicates. Blank lines are ignored.
pub fn read_reaction_atoms(reader: impl BufRead) -> Result<Vec<usize>, EngineError> {
    let mut seen = HashSet::new();
    let mut atoms = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let token = line.split_whitespace().nth(2).ok_or_else(|| {
            EngineError::InvalidInput(format!("reaction file line {} has fewer than 3 fields", i + 1))
        })?;
        let index: usize = token.parse().map_err(|_| {
            EngineError::InvalidInput(format!(
                "reaction file line {}: '{}' is not an atom index",
                i + 1,
                token
            ))
        })?;
        if seen.insert(index) {
            atoms.push(index);
        }
    }
    Ok(atoms)
}

/// Reaction atoms relative to the protein's centre of geometry.
pub fn reaction_template(protein: &Structure, atoms: &[usize]) -> Result<Vec<Vector3<f64>>, EngineError> {
    let center = protein
        .center_of_geometry()
        .ok_or_else(|| EngineError::InvalidInput("protein structure has no atoms".into()))?;
    atoms
        .iter()
        .map(|&index| {
            let atom = index
                .checked_sub(1)
                .and_then(|i| protein.atoms().get(i))
                .ok_or_else(|| {
                    EngineError::InvalidInput(format!(
                        "reaction atom {} outside a protein of {} atoms",
                        index,
                        protein.len()
                    ))
                })?;
            debug!(index, name = %atom.name, residue = %atom.res_name, res_seq = atom.res_seq, "Reaction atom");
            Ok(atom.position - center)
        })
        .collect()
}

/// Minimum crowder-to-reaction-atom distance of every frame.
///
/// The protein record (solute 1) places the reaction atoms; every other record adds
/// the periodic distances from its centre to each reaction atom; the record of the
/// last solute closes the frame.
pub fn minimum_distances(
    records: &[TrajectoryRecord],
    template: &[Vector3<f64>],
    box_length: f64,
    total_solutes: u32,
) -> Vec<f64> {
    let mut reaction_atoms: Vec<Point3<f64>> = Vec::new();
    let mut collected: Vec<f64> = Vec::new();
    let mut minima = Vec::new();
    for record in records {
        if record.solute == 1 {
            reaction_atoms = record.pose.place_all(template);
            collected.clear();
        } else {
            let center = record.pose.position();
            collected.extend(reaction_atoms.iter().map(|a| pbc_distance(a, &center, box_length)));
        }
        if record.solute == total_solutes {
            match collected.iter().copied().reduce(f64::min) {
                Some(min) => minima.push(min),
                None => warn!(frame = record.frame, "No crowder distances in frame"),
            }
        }
    }
    minima
}
