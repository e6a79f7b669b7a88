use crate::core::io::traits::StructureFile;
use crate::core::models::atom::Atom;
use crate::core::models::structure::Structure;
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PqrError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("No ATOM/HETATM records found")]
    Empty,
}

/// PQR files as written by PDB2PQR and APBS tools.
///
/// Fields are whitespace separated, with an optional chain column:
/// `record serial name resName [chain] resSeq x y z charge radius`.
pub struct PqrFile;

impl StructureFile for PqrFile {
    type Error = PqrError;

    fn read_from(reader: &mut impl BufRead) -> Result<Structure, Self::Error> {
        let mut structure = Structure::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line_num = index + 1;
            let fields: Vec<&str> = line.split_whitespace().collect();
            let Some(&record) = fields.first() else {
                continue;
            };
            if record != "ATOM" && record != "HETATM" {
                if record == "END" {
                    break;
                }
                continue;
            }
            let (chain_id, rest) = match fields.len() {
                11 => (fields[4].chars().next().unwrap_or(' '), &fields[5..]),
                10 => (' ', &fields[4..]),
                n => {
                    return Err(PqrError::Parse {
                        line: line_num,
                        message: format!("expected 10 or 11 fields, found {}", n),
                    });
                }
            };
            let numbers = rest
                .iter()
                .map(|f| f.parse::<f64>())
                .collect::<Result<Vec<f64>, _>>()
                .map_err(|e| PqrError::Parse {
                    line: line_num,
                    message: e.to_string(),
                })?;
            let res_seq: isize = rest[0].parse().map_err(|_| PqrError::Parse {
                line: line_num,
                message: format!("invalid residue number '{}'", rest[0]),
            })?;

            let mut atom = Atom::new(
                fields[2],
                fields[3],
                res_seq,
                Point3::new(numbers[1], numbers[2], numbers[3]),
            )
            .with_chain(chain_id);
            atom.record = record.parse().unwrap_or_default();
            atom.serial = fields[1].parse().unwrap_or(structure.len() + 1);
            atom.charge = numbers[4];
            atom.radius = numbers[5];
            structure.push(atom);
        }
        if structure.is_empty() {
            return Err(PqrError::Empty);
        }
        Ok(structure)
    }

    fn write_to(structure: &Structure, writer: &mut impl Write) -> Result<(), Self::Error> {
        for (i, atom) in structure.atoms().iter().enumerate() {
            writeln!(
                writer,
                "{:<6}{:>5} {:<4} {:>3} {}{:>4}    {:>8.3}{:>8.3}{:>8.3} {:>7.4} {:>6.4}",
                atom.record.as_str(),
                i + 1,
                atom.name,
                atom.res_name,
                atom.chain_id,
                atom.res_seq,
                atom.position.x,
                atom.position.y,
                atom.position.z,
                atom.charge,
                atom.radius
            )?;
        }
        writeln!(writer, "END")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_with_and_without_chain_column() {
        let text = "\
REMARK   1 PQR file
ATOM      1  N   MET A   1     -10.000   2.500   3.000 -0.3000 1.8240
ATOM      2  CA  MET     1     -9.000   2.000   3.500  0.2100 1.9080
END
";
        let s = PqrFile::read_from(&mut Cursor::new(text)).unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.atoms()[0].chain_id, 'A');
        assert_eq!(s.atoms()[1].chain_id, ' ');
        assert_eq!(s.atoms()[0].position, Point3::new(-10.0, 2.5, 3.0));
        assert!((s.atoms()[1].charge - 0.21).abs() < 1e-12);
        assert!((s.atoms()[1].radius - 1.908).abs() < 1e-12);
        assert_eq!(s.residue_count(), 2);
    }

    #[test]
    fn wrong_field_count_is_a_parse_error() {
        let text = "ATOM 1 N MET A 1 0.0 0.0\n";
        let err = PqrFile::read_from(&mut Cursor::new(text)).unwrap_err();
        assert!(matches!(err, PqrError::Parse { line: 1, .. }));
    }

    #[test]
    fn written_file_reads_back() {
        let text = "ATOM 1 CA GLY B 4 1.0 2.0 3.0 0.5 1.7\n";
        let s = PqrFile::read_from(&mut Cursor::new(text)).unwrap();
        let mut out = Vec::new();
        PqrFile::write_to(&s, &mut out).unwrap();
        let reread = PqrFile::read_from(&mut Cursor::new(out)).unwrap();
        assert_eq!(reread.atoms()[0].res_seq, 4);
        assert_eq!(reread.atoms()[0].chain_id, 'B');
        assert!((reread.atoms()[0].radius - 1.7).abs() < 1e-9);
    }
}
