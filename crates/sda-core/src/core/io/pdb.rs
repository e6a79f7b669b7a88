use crate::core::io::traits::StructureFile;
use crate::core::models::atom::{Atom, RecordKind};
use crate::core::models::structure::Structure;
use nalgebra::Point3;
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: PdbParseErrorKind },
    #[error("Missing required record: {0}")]
    MissingRecord(String),
}

#[derive(Debug, Error)]
pub enum PdbParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Line is too short for ATOM/HETATM record (must reach column 54)")]
    LineTooShort,
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len())).unwrap_or("").trim()
}

fn parse_float(line: &str, line_num: usize, start: usize, end: usize, columns: &str) -> Result<f64, PdbError> {
    let value = slice_and_trim(line, start, end);
    value.parse().map_err(|_| PdbError::Parse {
        line: line_num,
        kind: PdbParseErrorKind::InvalidFloat {
            columns: columns.into(),
            value: value.into(),
        },
    })
}

fn parse_optional_float(line: &str, start: usize, end: usize, default: f64) -> f64 {
    slice_and_trim(line, start, end).parse().unwrap_or(default)
}

/// Protein Data Bank coordinate files.
///
/// Only the first model is read. Serial numbers that do not parse (hybrid-36 or
/// overflowed columns in large files) are replaced by the running atom count.
pub struct PdbFile;

impl StructureFile for PdbFile {
    type Error = PdbError;

    fn read_from(reader: &mut impl BufRead) -> Result<Structure, Self::Error> {
        let mut structure = Structure::new();
        let mut in_model = false;

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;
            let record_type = slice_and_trim(&line, 0, 6);

            match record_type {
                "MODEL" => {
                    if in_model {
                        break;
                    }
                    in_model = true;
                }
                "ENDMDL" | "END" => break,
                "ATOM" | "HETATM" => {
                    if line.len() < 54 {
                        return Err(PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::LineTooShort,
                        });
                    }
                    let serial = slice_and_trim(&line, 6, 11)
                        .parse()
                        .unwrap_or(structure.len() + 1);
                    let name = slice_and_trim(&line, 12, 16);
                    let res_name = slice_and_trim(&line, 17, 20);
                    let chain_id = line.get(21..22).and_then(|c| c.chars().next()).unwrap_or(' ');
                    let res_seq_str = slice_and_trim(&line, 22, 26);
                    let res_seq: isize = res_seq_str.parse().map_err(|_| PdbError::Parse {
                        line: line_num,
                        kind: PdbParseErrorKind::InvalidInt {
                            columns: "23-26".into(),
                            value: res_seq_str.into(),
                        },
                    })?;
                    let i_code = line.get(26..27).and_then(|c| c.chars().next()).unwrap_or(' ');
                    let x = parse_float(&line, line_num, 30, 38, "31-38")?;
                    let y = parse_float(&line, line_num, 38, 46, "39-46")?;
                    let z = parse_float(&line, line_num, 46, 54, "47-54")?;

                    let mut atom = Atom::new(name, res_name, res_seq, Point3::new(x, y, z))
                        .with_element(slice_and_trim(&line, 76, 78))
                        .with_chain(chain_id);
                    atom.record = record_type.parse().unwrap_or_default();
                    atom.serial = serial;
                    atom.i_code = i_code;
                    atom.occupancy = parse_optional_float(&line, 54, 60, 1.0);
                    atom.b_factor = parse_optional_float(&line, 60, 66, 0.0);
                    structure.push(atom);
                }
                _ => {}
            }
        }

        if structure.is_empty() {
            return Err(PdbError::MissingRecord("ATOM/HETATM records".into()));
        }
        Ok(structure)
    }

    fn write_to(structure: &Structure, writer: &mut impl Write) -> Result<(), Self::Error> {
        let mut previous_chain: Option<char> = None;
        let mut serial = 0usize;
        for atom in structure.atoms() {
            if previous_chain.is_some_and(|c| c != atom.chain_id) {
                serial += 1;
                writeln!(writer, "TER   {:>5}", serial)?;
            }
            previous_chain = Some(atom.chain_id);
            serial += 1;
            writeln!(writer, "{}", format_atom_line(atom, serial))?;
        }
        if previous_chain.is_some() {
            serial += 1;
            writeln!(writer, "TER   {:>5}", serial)?;
        }
        writeln!(writer, "END")?;
        Ok(())
    }
}

/// Formats one 80-column ATOM/HETATM record.
///
/// Names shorter than four characters start in column 14 unless they carry a
/// two-letter element, following the PDB alignment convention.
pub fn format_atom_line(atom: &Atom, serial: usize) -> String {
    let name = if atom.name.len() < 4 && atom.element.len() < 2 {
        format!(" {:<3}", atom.name)
    } else {
        format!("{:<4}", atom.name)
    };
    let record = match atom.record {
        RecordKind::Atom => "ATOM  ",
        RecordKind::Hetatm => "HETATM",
    };
    format!(
        "{}{:>5} {} {:>3} {}{:>4}{}   {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}  ",
        record,
        serial % 100_000,
        name,
        atom.res_name,
        atom.chain_id,
        atom.res_seq,
        atom.i_code,
        atom.position.x,
        atom.position.y,
        atom.position.z,
        atom.occupancy,
        atom.b_factor,
        atom.element,
    )
}

/// Writes a point cloud as chlorine pseudo-atoms, one residue per point.
///
/// Used for quick trajectory visualisation and for cluster centres; each line reads
/// `ATOM  {i:5} CL   BEN A{i:4}    {x:8.3}{y:8.3}{z:8.3}  1.00  0.00          CL  `.
pub fn write_pseudo_atoms(points: &[Point3<f64>], writer: &mut impl Write) -> io::Result<()> {
    for (i, p) in points.iter().enumerate() {
        let i = i + 1;
        writeln!(
            writer,
            "ATOM  {:5} CL   BEN A{:4}    {:8.3}{:8.3}{:8.3}  1.00  0.00          CL  ",
            i, i, p.x, p.y, p.z
        )?;
    }
    Ok(())
}

pub fn write_pseudo_atoms_to_path<P: AsRef<Path>>(points: &[Point3<f64>], path: P) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_pseudo_atoms(points, &mut writer)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "\
REMARK test structure
ATOM      1  N   ALA A   1      11.104  13.207   2.100  1.00 20.00           N
ATOM      2  CA  ALA A   1      12.000  13.000   2.000  1.00 20.00           C
HETATM    3 CL1  BEN B   5      -1.500   0.250  10.000  0.50  0.00          CL
END
ATOM      4  N   GLY A   2       0.000   0.000   0.000  1.00 20.00           N
";

    #[test]
    fn reads_atoms_until_end_record() {
        let structure = PdbFile::read_from(&mut Cursor::new(SAMPLE)).unwrap();
        assert_eq!(structure.len(), 3);
        let cl = &structure.atoms()[2];
        assert_eq!(cl.record, RecordKind::Hetatm);
        assert_eq!(cl.name, "CL1");
        assert_eq!(cl.element, "CL");
        assert_eq!(cl.chain_id, 'B');
        assert_eq!(cl.res_seq, 5);
        assert_eq!(cl.occupancy, 0.5);
        assert_eq!(cl.position, Point3::new(-1.5, 0.25, 10.0));
        assert_eq!(structure.residue_count(), 2);
    }

    #[test]
    fn stops_after_first_model() {
        let text = "\
MODEL        1
ATOM      1  CA  ALA A   1       1.000   1.000   1.000  1.00  0.00           C
ENDMDL
MODEL        2
ATOM      1  CA  ALA A   1       2.000   2.000   2.000  1.00  0.00           C
ENDMDL
";
        let structure = PdbFile::read_from(&mut Cursor::new(text)).unwrap();
        assert_eq!(structure.len(), 1);
        assert_eq!(structure.atoms()[0].position.x, 1.0);
    }

    #[test]
    fn invalid_coordinate_reports_line_and_columns() {
        let text = "ATOM      1  CA  ALA A   1       x.000   1.000   1.000  1.00  0.00           C\n";
        let err = PdbFile::read_from(&mut Cursor::new(text)).unwrap_err();
        match err {
            PdbError::Parse {
                line,
                kind: PdbParseErrorKind::InvalidFloat { columns, .. },
            } => {
                assert_eq!(line, 1);
                assert_eq!(columns, "31-38");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_file_is_missing_atoms() {
        let err = PdbFile::read_from(&mut Cursor::new("REMARK nothing\n")).unwrap_err();
        assert!(matches!(err, PdbError::MissingRecord(_)));
    }

    #[test]
    fn written_structure_reads_back_with_chain_breaks() {
        let structure = PdbFile::read_from(&mut Cursor::new(SAMPLE)).unwrap();
        let mut out = Vec::new();
        PdbFile::write_to(&structure, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("TER").count(), 2);
        assert!(text.ends_with("END\n"));
        let reread = PdbFile::read_from(&mut Cursor::new(text)).unwrap();
        assert_eq!(reread.len(), structure.len());
        assert_eq!(reread.atoms()[1].name, "CA");
        assert_eq!(reread.atoms()[2].element, "CL");
    }

    #[test]
    fn pseudo_atom_lines_match_visualisation_layout() {
        let mut out = Vec::new();
        write_pseudo_atoms(&[Point3::new(1.0, -2.5, 30.125)], &mut out).unwrap();
        let line = String::from_utf8(out).unwrap();
        assert_eq!(
            line,
            "ATOM      1 CL   BEN A   1       1.000  -2.500  30.125  1.00  0.00          CL  \n"
        );
    }
}
