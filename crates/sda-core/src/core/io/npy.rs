//! NumPy `.npy` files holding one-dimensional `f64` arrays.

use ndarray::{Array1, ArrayView1};
use ndarray_npy::{ReadNpyError, ReadNpyExt, WriteNpyError, WriteNpyExt};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NpyError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid NPY array: {0}")]
    Read(#[from] ReadNpyError),
    #[error("Failed to write NPY array: {0}")]
    Write(#[from] WriteNpyError),
}

/// Writes `values` as a `<f8` array of shape `(n,)`.
pub fn write_f64(values: &[f64], writer: &mut impl Write) -> Result<(), NpyError> {
    ArrayView1::from(values).write_npy(writer)?;
    Ok(())
}

pub fn write_f64_to_path<P: AsRef<Path>>(values: &[f64], path: P) -> Result<(), NpyError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_f64(values, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Reads a one-dimensional `f64` array. Other dtypes, other ranks and headers
/// whose shape does not match the data are errors.
pub fn read_f64(reader: &mut impl Read) -> Result<Vec<f64>, NpyError> {
    let array = Array1::<f64>::read_npy(reader)?;
    Ok(array.to_vec())
}

pub fn read_f64_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<f64>, NpyError> {
    let mut reader = BufReader::new(File::open(path)?);
    read_f64(&mut reader)
}
