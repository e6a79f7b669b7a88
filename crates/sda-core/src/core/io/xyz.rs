use nalgebra::Point3;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Writes one point per line as `{x:>7.3} {y:>7.3} {z:>7.3}`.
pub fn write_points(points: &[Point3<f64>], writer: &mut impl Write) -> io::Result<()> {
    for p in points {
        writeln!(writer, "{:>7.3} {:>7.3} {:>7.3}", p.x, p.y, p.z)?;
    }
    Ok(())
}

pub fn write_points_to_path<P: AsRef<Path>>(points: &[Point3<f64>], path: P) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_points(points, &mut writer)?;
    writer.flush()
}

/// Reads whitespace-separated point triples; blank lines are skipped.
pub fn read_points(reader: &mut impl BufRead) -> io::Result<Vec<Point3<f64>>> {
    let mut points = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let coords = line
            .split_whitespace()
            .take(3)
            .map(str::parse::<f64>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| invalid_line(index + 1, &e.to_string()))?;
        if coords.len() < 3 {
            return Err(invalid_line(index + 1, "expected three coordinates"));
        }
        points.push(Point3::new(coords[0], coords[1], coords[2]));
    }
    Ok(points)
}

pub fn read_points_from_path<P: AsRef<Path>>(path: P) -> io::Result<Vec<Point3<f64>>> {
    let mut reader = BufReader::new(File::open(path)?);
    read_points(&mut reader)
}

fn invalid_line(line: usize, message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("line {}: {}", line, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn writes_fixed_width_columns() {
        let mut out = Vec::new();
        write_points(&[Point3::new(1.0, -22.5, 100.25)], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "  1.000 -22.500 100.250\n");
    }

    #[test]
    fn reads_points_and_rejects_short_lines() {
        let points = read_points(&mut Cursor::new("1 2 3\n\n4.5 5 6\n")).unwrap();
        assert_eq!(points, vec![Point3::new(1.0, 2.0, 3.0), Point3::new(4.5, 5.0, 6.0)]);
        let err = read_points(&mut Cursor::new("1 2\n")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
