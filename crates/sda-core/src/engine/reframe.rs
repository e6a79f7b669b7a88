//! Re-expresses ligand poses in the body frame of the protein.

use super::error::EngineError;
use crate::core::io::trajectory::{Pose, TrajectoryRecord, splice_pose};
use crate::core::utils::geometry::minimum_image;
use nalgebra::{Matrix3, Point3, Vector3};

/// Protein pose rewritten in its own frame: zero translation and the rows of
/// `RᵀR` (identity up to rounding) as basis vectors.
pub fn align_protein(protein: &Pose) -> Pose {
    let r = protein.rotation();
    let aligned = r.transpose() * r;
    Pose {
        translation: Vector3::zeros(),
        r1: aligned.row(0).transpose(),
        r2: aligned.row(1).transpose(),
    }
}

/// Ligand pose relative to the protein.
///
/// The separation vector is folded with the minimum-image convention and rotated
/// into the protein frame; the new basis vectors are the ligand basis vectors seen
/// from the protein, i.e. the rows of `(R_pᵀ R_l)ᵀ`.
pub fn align_ligand(protein: &Pose, ligand: &Pose, box_length: f64) -> Pose {
    let rp_t = protein.rotation().transpose();
    let delta = minimum_image(&(ligand.translation - protein.translation), box_length);
    let relative: Matrix3<f64> = (rp_t * ligand.rotation()).transpose();
    Pose {
        translation: rp_t * delta,
        r1: relative.row(0).transpose(),
        r2: relative.row(1).transpose(),
    }
}

/// Centre of the ligand atoms in the protein frame.
///
/// `template` holds the ligand atoms relative to the ligand's centre of geometry.
/// Each atom is placed with the ligand rotation, shifted by the minimum-image
/// separation and rotated back into the protein frame.
pub fn ligand_center_in_protein_frame(
    protein: &Pose,
    ligand: &Pose,
    template: &[Vector3<f64>],
    box_length: f64,
) -> Option<Point3<f64>> {
    if template.is_empty() {
        return None;
    }
    let rp_t = protein.rotation().transpose();
    let rl = ligand.rotation();
    let delta = minimum_image(&(ligand.translation - protein.translation), box_length);
    let sum = template
        .iter()
        .fold(Vector3::zeros(), |acc, a| acc + rp_t * (rl * a + delta));
    Some(Point3::from(sum / template.len() as f64))
}

/// Rewrites an encounter trajectory so the protein sits at the origin.
///
/// Records are expected in protein/ligand pairs (solutes 1 and 2); other solutes are
/// dropped. A ligand record before any protein record is an error.
pub fn align_records(records: &[TrajectoryRecord], box_length: f64) -> Result<Vec<String>, EngineError> {
    let mut protein: Option<Pose> = None;
    let mut lines = Vec::with_capacity(records.len());
    for record in records {
        let pose = match record.solute {
            1 => {
                protein = Some(record.pose);
                align_protein(&record.pose)
            }
            2 => {
                let protein = protein.as_ref().ok_or_else(|| {
                    EngineError::InvalidInput(format!(
                        "ligand record of frame {} precedes any protein record",
                        record.frame
                    ))
                })?;
                align_ligand(protein, &record.pose, box_length)
            }
            _ => continue,
        };
        let line = splice_pose(&record.line, &pose)
            .map_err(|e| EngineError::InvalidInput(format!("frame {}: {}", record.frame, e)))?;
        lines.push(line);
    }
    Ok(lines)
}

/// Ligand centre in the protein frame for every ligand record.
pub fn ligand_track(
    records: &[TrajectoryRecord],
    template: &[Vector3<f64>],
    box_length: f64,
) -> Result<Vec<Point3<f64>>, EngineError> {
    let mut protein: Option<Pose> = None;
    let mut track = Vec::new();
    for record in records {
        match record.solute {
            1 => protein = Some(record.pose),
            2 => {
                let protein = protein.as_ref().ok_or_else(|| {
                    EngineError::InvalidInput(format!(
                        "ligand record of frame {} precedes any protein record",
                        record.frame
                    ))
                })?;
                let center = ligand_center_in_protein_frame(protein, &record.pose, template, box_length)
                    .ok_or_else(|| EngineError::InvalidInput("ligand template has no atoms".into()))?;
                track.push(center);
            }
            _ => {}
        }
    }
    Ok(track)
}
