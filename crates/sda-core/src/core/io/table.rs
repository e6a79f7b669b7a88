//! Space-separated numeric tables without a header row.

use csv::{ReaderBuilder, WriterBuilder};
use std::io::{Read, Write};
use std::path::Path;

/// Shortest round-trip text of `value` in the layout Python's `repr` uses:
/// `0.5`, `3.0`, `1e-05`, `1.5e+16`, `nan`, `inf`.
pub fn float_repr(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let repr = format!("{:?}", value);
    match repr.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => repr,
    }
}

pub fn write_rows<W, R, S>(writer: W, rows: R) -> Result<(), csv::Error>
where
    W: Write,
    R: IntoIterator<Item = Vec<S>>,
    S: AsRef<str>,
{
    let mut table = WriterBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .flexible(true)
        .from_writer(writer);
    for row in rows {
        table.write_record(row.iter().map(|field| field.as_ref()))?;
    }
    table.flush()?;
    Ok(())
}

pub fn write_rows_to_path<P, R, S>(path: P, rows: R) -> Result<(), csv::Error>
where
    P: AsRef<Path>,
    R: IntoIterator<Item = Vec<S>>,
    S: AsRef<str>,
{
    let file = std::fs::File::create(path)?;
    write_rows(file, rows)
}

/// Reads every row as floats. Runs of spaces are treated as a single separator.
pub fn read_numeric_rows<R: Read>(mut reader: R) -> Result<Vec<Vec<f64>>, csv::Error> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    let normalized: String = text
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let mut table = ReaderBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .flexible(true)
        .from_reader(normalized.as_bytes());
    let mut rows = Vec::new();
    for record in table.records() {
        let record = record?;
        let row = record
            .iter()
            .map(|field| {
                field.parse::<f64>().map_err(|e| {
                    csv::Error::from(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;
        rows.push(row);
    }
    Ok(rows)
}
