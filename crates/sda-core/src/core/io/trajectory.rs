use crate::core::utils::geometry::rotation_from_basis;
use nalgebra::{Matrix3, Point3, Vector3};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrajectoryError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Trajectory file is missing its two header lines")]
    MissingHeader,
    #[error("Line {line}: expected at least {expected} columns, found {found}")]
    TooFewColumns {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("Line {line}: invalid {field} value '{value}'")]
    InvalidField {
        line: usize,
        field: &'static str,
        value: String,
    },
    #[error("Line is {length} characters long, fixed-column rewrite needs at least 105")]
    LineTooShort { length: usize },
}

/// Column layout of an SDA trajectory file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrajectoryLayout {
    /// `traj frame solute x y z r1x r1y r1z r2x r2y r2z ...`, written by association runs.
    #[default]
    Indexed,
    /// `frame solute x y z [r1x r1y r1z r2x r2y r2z] ...`, written by single crowded runs.
    Frame,
}

impl TrajectoryLayout {
    fn leading_columns(self) -> usize {
        match self {
            TrajectoryLayout::Indexed => 3,
            TrajectoryLayout::Frame => 2,
        }
    }
}

/// Rigid-body pose of one solute: translation plus the first two basis vectors of its
/// body-to-lab rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub translation: Vector3<f64>,
    pub r1: Vector3<f64>,
    pub r2: Vector3<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            translation: Vector3::zeros(),
            r1: Vector3::x(),
            r2: Vector3::y(),
        }
    }
}

impl Pose {
    pub fn position(&self) -> Point3<f64> {
        Point3::from(self.translation)
    }

    pub fn rotation(&self) -> Matrix3<f64> {
        rotation_from_basis(&self.r1, &self.r2)
    }

    /// Lab-frame position of a body atom given relative to the solute centre.
    pub fn place(&self, body: &Vector3<f64>) -> Point3<f64> {
        Point3::from(self.rotation() * body + self.translation)
    }

    pub fn place_all(&self, body: &[Vector3<f64>]) -> Vec<Point3<f64>> {
        let rotation = self.rotation();
        body.iter()
            .map(|a| Point3::from(rotation * a + self.translation))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryRecord {
    /// Trajectory number, only present in the `Indexed` layout.
    pub traj: Option<u64>,
    pub frame: i64,
    pub solute: u32,
    pub pose: Pose,
    /// The record as read, without its line terminator.
    pub line: String,
}

impl TrajectoryRecord {
    /// Parses one record line; `line_num` is only used for error reporting.
    pub fn parse(line: &str, layout: TrajectoryLayout, line_num: usize) -> Result<Self, TrajectoryError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let lead = layout.leading_columns();
        if fields.len() < lead + 3 {
            return Err(TrajectoryError::TooFewColumns {
                line: line_num,
                expected: lead + 3,
                found: fields.len(),
            });
        }

        let number = |index: usize, field: &'static str| -> Result<f64, TrajectoryError> {
            fields[index].parse::<f64>().map_err(|_| TrajectoryError::InvalidField {
                line: line_num,
                field,
                value: fields[index].to_string(),
            })
        };
        let integer = |index: usize, field: &'static str| -> Result<i64, TrajectoryError> {
            let raw = fields[index];
            raw.parse::<i64>()
                .or_else(|_| raw.parse::<f64>().map(|v| v as i64))
                .map_err(|_| TrajectoryError::InvalidField {
                    line: line_num,
                    field,
                    value: raw.to_string(),
                })
        };

        let unsigned = |index: usize, field: &'static str| -> Result<u64, TrajectoryError> {
            u64::try_from(integer(index, field)?).map_err(|_| TrajectoryError::InvalidField {
                line: line_num,
                field,
                value: fields[index].to_string(),
            })
        };

        let traj = match layout {
            TrajectoryLayout::Indexed => Some(unsigned(0, "traj")?),
            TrajectoryLayout::Frame => None,
        };
        let frame = integer(lead - 2, "frame")?;
        let solute = u32::try_from(unsigned(lead - 1, "solute")?).map_err(|_| TrajectoryError::InvalidField {
            line: line_num,
            field: "solute",
            value: fields[lead - 1].to_string(),
        })?;
        let translation = Vector3::new(
            number(lead, "x")?,
            number(lead + 1, "y")?,
            number(lead + 2, "z")?,
        );

        let pose = if fields.len() >= lead + 9 {
            Pose {
                translation,
                r1: Vector3::new(number(lead + 3, "r1x")?, number(lead + 4, "r1y")?, number(lead + 5, "r1z")?),
                r2: Vector3::new(number(lead + 6, "r2x")?, number(lead + 7, "r2y")?, number(lead + 8, "r2z")?),
            }
        } else if layout == TrajectoryLayout::Indexed {
            return Err(TrajectoryError::TooFewColumns {
                line: line_num,
                expected: lead + 9,
                found: fields.len(),
            });
        } else {
            Pose {
                translation,
                ..Pose::default()
            }
        };

        Ok(Self {
            traj,
            frame,
            solute,
            pose,
            line: line.to_string(),
        })
    }
}

/// An SDA trajectory file held in memory: the two header lines and every record.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    pub header: Vec<String>,
    pub records: Vec<TrajectoryRecord>,
}

impl Trajectory {
    pub fn read_from(reader: &mut impl BufRead, layout: TrajectoryLayout) -> Result<Self, TrajectoryError> {
        let mut header = Vec::with_capacity(2);
        let mut records = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if index < 2 {
                header.push(line);
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }
            records.push(TrajectoryRecord::parse(&line, layout, index + 1)?);
        }
        if header.len() < 2 {
            return Err(TrajectoryError::MissingHeader);
        }
        Ok(Self { header, records })
    }

    pub fn from_path<P: AsRef<Path>>(path: P, layout: TrajectoryLayout) -> Result<Self, TrajectoryError> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::read_from(&mut reader, layout)
    }
}

/// Writes `header` followed by `lines`, one per line.
pub fn write_lines<P, S>(path: P, header: &[String], lines: &[S]) -> io::Result<()>
where
    P: AsRef<Path>,
    S: AsRef<str>,
{
    let mut writer = BufWriter::new(File::create(path)?);
    for line in header {
        writeln!(writer, "{}", line)?;
    }
    for line in lines {
        writeln!(writer, "{}", line.as_ref())?;
    }
    writer.flush()
}

const TRANSLATION_COLUMNS: [(usize, usize); 3] = [(26, 33), (35, 42), (44, 51)];
const ROTATION_COLUMNS: [(usize, usize); 6] = [(54, 60), (63, 69), (72, 78), (81, 87), (90, 96), (99, 105)];

/// Rewrites the translation and rotation columns of an `Indexed` record in place.
///
/// Translation fields are right-aligned to width 7 and rotation fields to width 6, all
/// with three decimals. Every other character of the line, including anything past
/// column 105, is preserved.
pub fn splice_pose(line: &str, pose: &Pose) -> Result<String, TrajectoryError> {
    if line.len() < 105 || !line.is_char_boundary(105) {
        return Err(TrajectoryError::LineTooShort { length: line.len() });
    }
    let translation = [pose.translation.x, pose.translation.y, pose.translation.z];
    let rotation = [pose.r1.x, pose.r1.y, pose.r1.z, pose.r2.x, pose.r2.y, pose.r2.z];

    let mut fields: Vec<(usize, usize, String)> = Vec::with_capacity(9);
    for (&(start, end), value) in TRANSLATION_COLUMNS.iter().zip(translation) {
        fields.push((start, end, format!("{:>7.3}", value)));
    }
    for (&(start, end), value) in ROTATION_COLUMNS.iter().zip(rotation) {
        fields.push((start, end, format!("{:>6.3}", value)));
    }

    let mut out = String::with_capacity(line.len() + 8);
    let mut cursor = 0;
    for (start, end, text) in fields {
        out.push_str(&line[cursor..start]);
        out.push_str(&text);
        cursor = end;
    }
    out.push_str(&line[cursor..]);
    Ok(out)
}
