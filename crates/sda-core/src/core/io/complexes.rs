use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComplexesError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Line {line}: expected `traj frame solute ...`, got '{content}'")]
    Malformed { line: usize, content: String },
    #[error("Encounter of trajectory {traj} on line {line} has no partner record")]
    MissingPartner { traj: u64, line: usize },
}

/// First recorded encounter complex of one trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct FirstEncounter {
    pub frame: i64,
    /// The accepted record and the record following it (the partner solute).
    pub complex_lines: [String; 2],
}

/// Scans a complexes file for the first encounter of every trajectory.
///
/// A record opens an encounter when its trajectory differs from the last accepted one
/// and its frame is not 0. The last accepted trajectory starts at 0, so trajectory 0
/// is never accepted.
pub fn first_encounters(reader: &mut impl BufRead) -> Result<BTreeMap<u64, FirstEncounter>, ComplexesError> {
    let lines: Vec<String> = reader.lines().skip(2).collect::<Result<_, _>>()?;
    let mut encounters = BTreeMap::new();
    let mut previous_traj = 0u64;

    for (i, line) in lines.iter().enumerate() {
        let line_num = i + 3;
        let mut fields = line.split_whitespace();
        let (Some(traj), Some(frame)) = (fields.next(), fields.next()) else {
            if line.trim().is_empty() {
                continue;
            }
            return Err(ComplexesError::Malformed {
                line: line_num,
                content: line.clone(),
            });
        };
        let malformed = || ComplexesError::Malformed {
            line: line_num,
            content: line.clone(),
        };
        let traj: u64 = traj.parse().map_err(|_| malformed())?;
        let frame: i64 = frame.parse().map_err(|_| malformed())?;

        if traj != previous_traj && frame != 0 {
            previous_traj = traj;
            let partner = lines
                .get(i + 1)
                .ok_or(ComplexesError::MissingPartner { traj, line: line_num })?;
            encounters.insert(
                traj,
                FirstEncounter {
                    frame,
                    complex_lines: [line.clone(), partner.clone()],
                },
            );
        }
    }
    Ok(encounters)
}

pub fn first_encounters_from_path<P: AsRef<Path>>(
    path: P,
) -> Result<BTreeMap<u64, FirstEncounter>, ComplexesError> {
    let mut reader = BufReader::new(File::open(path)?);
    first_encounters(&mut reader)
}

/// Number of lines of a file.
pub fn count_lines<P: AsRef<Path>>(path: P) -> io::Result<usize> {
    let reader = BufReader::new(File::open(path)?);
    let mut count = 0;
    for line in reader.lines() {
        line?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const COMPLEXES: &str = "\
header 1
header 2
0 40 1 a
0 40 2 b
3 0 1 start
3 0 2 start
3 120 1 p3
3 120 2 l3
3 140 1 later
3 140 2 later
5 60 1 p5
5 60 2 l5
";

    #[test]
    fn keeps_first_nonzero_frame_per_trajectory() {
        let map = first_encounters(&mut Cursor::new(COMPLEXES)).unwrap();
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![3, 5]);
        assert_eq!(map[&3].frame, 120);
        assert_eq!(map[&3].complex_lines, ["3 120 1 p3".to_string(), "3 120 2 l3".to_string()]);
        assert_eq!(map[&5].complex_lines[1], "5 60 2 l5");
    }

    #[test]
    fn trailing_encounter_without_partner_is_an_error() {
        let text = "h\nh\n4 10 1 only\n";
        let err = first_encounters(&mut Cursor::new(text)).unwrap_err();
        assert!(matches!(err, ComplexesError::MissingPartner { traj: 4, line: 3 }));
    }

    #[test]
    fn malformed_record_reports_line() {
        let text = "h\nh\nx 10 1\n";
        let err = first_encounters(&mut Cursor::new(text)).unwrap_err();
        assert!(matches!(err, ComplexesError::Malformed { line: 3, .. }));
    }
}
