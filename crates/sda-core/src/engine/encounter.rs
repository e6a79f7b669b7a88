use crate::core::io::complexes::{FirstEncounter, count_lines};
use crate::core::io::trajectory::TrajectoryRecord;
use crate::core::utils::geometry::pbc_distance;
use nalgebra::Point3;
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use tracing::{debug, trace};

/// Frames of one trajectory leading up to its first encounter complex.
#[derive(Debug, Clone, PartialEq)]
pub struct EncounterTrajectory {
    pub traj: u64,
    /// Raw record lines: the buffered approach followed by the two complex lines.
    pub lines: Vec<String>,
}

/// Cuts encounter sub-trajectories out of an association run.
///
/// Only trajectories listed in `encounters` and solutes 1 (protein) and 2 (ligand)
/// are considered. Lines are buffered until the encounter frame; whenever the
/// protein-ligand distance exceeds `cutoff` the buffer is dropped, so only the last
/// uninterrupted approach survives. The first record past the encounter frame emits
/// the buffer followed by the complex lines, once per trajectory.
pub fn extract_encounters(
    records: &[TrajectoryRecord],
    encounters: &BTreeMap<u64, FirstEncounter>,
    box_length: f64,
    cutoff: f64,
) -> Vec<EncounterTrajectory> {
    let mut emitted = Vec::new();
    let mut buffer: Vec<String> = Vec::new();
    let mut previous_traj = 0u64;
    let mut printed = false;
    let mut protein = Point3::origin();
    let mut ligand = Point3::origin();

    for (i, record) in records.iter().enumerate() {
        let Some(traj) = record.traj else {
            continue;
        };
        let Some(encounter) = encounters.get(&traj) else {
            continue;
        };
        if record.solute > 2 {
            continue;
        }

        if record.solute == 1 {
            protein = record.pose.position();
            if let Some(next) = records.get(i + 1) {
                ligand = next.pose.position();
            }
        }

        if traj > previous_traj {
            buffer.clear();
            printed = false;
            previous_traj = traj;
        }

        if record.frame <= encounter.frame {
            buffer.push(record.line.clone());
        }

        if pbc_distance(&ligand, &protein, box_length) > cutoff {
            if !buffer.is_empty() {
                trace!(traj, frame = record.frame, "Ligand left the cutoff sphere, dropping buffer");
            }
            buffer.clear();
        }

        if record.frame > encounter.frame && !printed {
            printed = true;
            let mut lines = std::mem::take(&mut buffer);
            lines.extend(encounter.complex_lines.iter().cloned());
            debug!(traj, frames = lines.len(), "Encounter trajectory extracted");
            emitted.push(EncounterTrajectory { traj, lines });
        }
    }
    emitted
}

/// Keeps the complexes files with more than `total_solutes + 2` lines (i.e. at least
/// one complex beyond the header) and returns their names with `strip` removed.
pub fn select_encounter_files<P: AsRef<Path>>(
    files: &[P],
    total_solutes: usize,
    strip: &str,
) -> io::Result<Vec<String>> {
    let mut selected = Vec::new();
    for file in files {
        let file = file.as_ref();
        if count_lines(file)? > total_solutes + 2 {
            selected.push(file.to_string_lossy().replace(strip, ""));
        }
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::complexes::first_encounters;
    use crate::core::io::trajectory::TrajectoryLayout;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn record(traj: u64, frame: i64, solute: u32, x: f64) -> TrajectoryRecord {
        let line = format!("{} {} {} {} 0.0 0.0 1 0 0 0 1 0", traj, frame, solute, x);
        TrajectoryRecord::parse(&line, TrajectoryLayout::Indexed, 1).unwrap()
    }

    fn encounters() -> BTreeMap<u64, FirstEncounter> {
        let text = "h\nh\n1 30 1 complex-p\n1 30 2 complex-l\n";
        first_encounters(&mut Cursor::new(text)).unwrap()
    }

    #[test]
    fn buffers_frames_up_to_the_encounter() {
        let records = vec![
            record(1, 10, 1, 0.0),
            record(1, 10, 2, 10.0),
            record(1, 10, 3, 50.0),
            record(1, 20, 1, 0.0),
            record(1, 20, 2, 5.0),
            record(1, 40, 1, 0.0),
            record(1, 40, 2, 4.0),
        ];
        let out = extract_encounters(&records, &encounters(), 100.0, 20.0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].traj, 1);
        assert_eq!(out[0].lines.len(), 6);
        assert!(out[0].lines[0].starts_with("1 10 1"));
        assert!(out[0].lines[3].starts_with("1 20 2"));
        assert_eq!(out[0].lines[4], "1 30 1 complex-p");
        assert_eq!(out[0].lines[5], "1 30 2 complex-l");
    }

    #[test]
    fn leaving_the_cutoff_restarts_the_buffer() {
        let records = vec![
            record(1, 10, 1, 0.0),
            record(1, 10, 2, 10.0),
            record(1, 20, 1, 0.0),
            record(1, 20, 2, 45.0),
            record(1, 25, 1, 0.0),
            record(1, 25, 2, 8.0),
            record(1, 40, 1, 0.0),
            record(1, 40, 2, 8.0),
        ];
        let out = extract_encounters(&records, &encounters(), 100.0, 20.0);
        assert_eq!(out.len(), 1);
        let frames: Vec<&str> = out[0].lines.iter().map(|l| l.split_whitespace().nth(1).unwrap()).collect();
        assert_eq!(frames, vec!["25", "25", "30", "30"]);
    }

    #[test]
    fn distance_uses_periodic_images() {
        let records = vec![
            record(1, 10, 1, 1.0),
            record(1, 10, 2, 99.0),
            record(1, 40, 1, 1.0),
            record(1, 40, 2, 99.0),
        ];
        let out = extract_encounters(&records, &encounters(), 100.0, 5.0);
        assert_eq!(out[0].lines.len(), 4);
    }

    #[test]
    fn trajectories_without_encounters_are_ignored() {
        let records = vec![record(2, 10, 1, 0.0), record(2, 50, 2, 1.0)];
        assert!(extract_encounters(&records, &encounters(), 100.0, 20.0).is_empty());
    }

    #[test]
    fn selects_files_with_complexes_beyond_header() {
        let dir = tempdir().unwrap();
        let full = dir.path().join("complexes_12");
        let empty = dir.path().join("complexes_13");
        std::fs::write(&full, "h\nh\na\nb\nc\n").unwrap();
        std::fs::write(&empty, "h\nh\na\nb\n").unwrap();
        let prefix = format!("{}/complexes_", dir.path().display());
        let selected = select_encounter_files(&[full, empty], 2, &prefix).unwrap();
        assert_eq!(selected, vec!["12".to_string()]);
    }
}
